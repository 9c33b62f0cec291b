//! Email bridge transport
//!
//! Posts JSON email requests to an external bridge service. Delivery is
//! best-effort: transport and status failures are logged and swallowed.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};

pub struct EmailSender {
    endpoint: String,
    from_address: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailRequest<'a> {
    subject: &'a str,
    html: &'a str,
    recipients: &'a [String],
    relative_host: &'a str,
    from: EmailFrom<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailFrom<'a> {
    name: &'a str,
    email_address: &'a str,
}

impl EmailSender {
    pub fn new(endpoint: &str, from_address: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            from_address: from_address.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Post one email to the bridge
    pub async fn send(&self, subject: &str, html_body: &str, recipients: &[String], from_name: &str) {
        let request = EmailRequest {
            subject,
            html: html_body,
            recipients,
            // The bridge requires the field but ignores its value
            relative_host: " ",
            from: EmailFrom {
                name: from_name,
                email_address: &self.from_address,
            },
        };

        debug!(subject = %subject, recipients = ?recipients, "Posting email request");

        match self.client.post(&self.endpoint).json(&request).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(subject = %subject, "Email sent successfully");
            }
            Ok(resp) => {
                error!(status = %resp.status(), "Email bridge returned non-success status");
            }
            Err(e) => {
                error!("There was an error when sending email: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_request_wire_shape() {
        let recipients = vec!["driver@example.com".to_string()];
        let request = EmailRequest {
            subject: "Claim Paid",
            html: "Your claim with id C1 has been paid out",
            recipients: &recipients,
            relative_host: " ",
            from: EmailFrom {
                name: "Blockchain Insurance",
                email_address: "no-reply@example.com",
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["subject"], "Claim Paid");
        assert_eq!(value["html"], "Your claim with id C1 has been paid out");
        assert_eq!(value["recipients"][0], "driver@example.com");
        assert_eq!(value["relativeHost"], " ");
        assert_eq!(value["from"]["name"], "Blockchain Insurance");
        assert_eq!(value["from"]["emailAddress"], "no-reply@example.com");
    }
}
