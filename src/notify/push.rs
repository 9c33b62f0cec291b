//! FCM push transport

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub struct PushSender {
    endpoint: String,
    server_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    notification: PushNotification<'a>,
}

#[derive(Debug, Serialize)]
struct PushNotification<'a> {
    title: &'a str,
    body: &'a str,
}

impl PushSender {
    pub fn new(endpoint: &str, server_key: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            server_key: server_key.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Send one push message to a registered device
    pub async fn send(&self, device_token: &str, title: &str, body: &str) {
        let request = PushRequest {
            to: device_token,
            notification: PushNotification { title, body },
        };

        match self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&request)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                debug!(title = %title, "Push notification sent");
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "Push endpoint returned non-success status");
            }
            Err(e) => {
                warn!("Failed to send push notification: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_request_wire_shape() {
        let request = PushRequest {
            to: "device-token-1",
            notification: PushNotification {
                title: "Claim Paid",
                body: "Your claim with id C1 has been paid out",
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["to"], "device-token-1");
        assert_eq!(value["notification"]["title"], "Claim Paid");
        assert_eq!(
            value["notification"]["body"],
            "Your claim with id C1 has been paid out"
        );
    }
}
