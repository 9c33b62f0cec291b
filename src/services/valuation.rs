//! Vehicle valuation lookup
//!
//! External pricing API with a memoize-with-TTL cache. The API prices in
//! dollars; a crude conversion rate produces the pound value the chaincode
//! expects. With no API key configured every lookup returns a fixed dummy
//! value, uncached.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::ValuationArgs;

/// Dummy valuation when no API key is configured or a lookup fails
const DEFAULT_CAR_VALUE: f64 = 6000.0;
/// Rough dollar to pound conversion applied to API results
const DOLLAR_TO_POUND_RATE: f64 = 0.8;
/// Memoized valuations live for an hour
const MEMO_TTL: Duration = Duration::from_secs(3600);

/// Vehicle valuation, in pounds
#[async_trait]
pub trait ValuationSource: Send + Sync {
    async fn vehicle_value(&self, style_id: &str, mileage: &str) -> f64;
}

#[derive(Debug, Clone)]
struct MemoEntry {
    value_pounds: f64,
    expires_at: Instant,
}

/// Valuation source backed by the Edmunds TMV API
pub struct EdmundsValuation {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    memo: DashMap<String, MemoEntry>,
}

impl EdmundsValuation {
    pub fn new(args: &ValuationArgs) -> Self {
        Self {
            base_url: args.valuation_url.trim_end_matches('/').to_string(),
            api_key: args.valuation_api_key.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            memo: DashMap::new(),
        }
    }

    /// Remove expired memo entries
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.memo.len();
        self.memo.retain(|_, entry| entry.expires_at > now);
        before - self.memo.len()
    }

    fn memo_key(style_id: &str, mileage: &str) -> String {
        format!("{}:{}", style_id, mileage)
    }

    /// Fetch the dollar valuation: national base retail plus the mileage
    /// adjustment. Condition and zip are fixed, matching the request shape
    /// the pricing API documents for used-vehicle TMV.
    async fn fetch_dollar_value(&self, style_id: &str, mileage: &str, api_key: &str) -> Option<f64> {
        let url = format!(
            "{}/calculateusedtmv?styleid={}&condition=Clean&mileage={}&zip=32789&fmt=json&api_key={}",
            self.base_url, style_id, mileage, api_key
        );

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Unable to retrieve car value: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            error!(status = %response.status(), "Unable to retrieve car value");
            return None;
        }

        match response.json::<TmvResponse>().await {
            Ok(body) => {
                Some(body.tmv.national_base_price.used_tmv_retail
                    + body.tmv.mileage_adjustment.used_tmv_retail)
            }
            Err(e) => {
                error!("Unable to parse car value response: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl ValuationSource for EdmundsValuation {
    async fn vehicle_value(&self, style_id: &str, mileage: &str) -> f64 {
        let key = Self::memo_key(style_id, mileage);

        if let Some(entry) = self.memo.get(&key) {
            if entry.expires_at > Instant::now() {
                debug!(style_id = %style_id, mileage = %mileage, "Valuation memo hit");
                return entry.value_pounds;
            }
        }

        let Some(ref api_key) = self.api_key else {
            error!("Valuation API key not set, returning dummy value");
            return DEFAULT_CAR_VALUE;
        };

        let value_dollars = self
            .fetch_dollar_value(style_id, mileage, api_key)
            .await
            .unwrap_or(DEFAULT_CAR_VALUE);

        let value_pounds = value_dollars * DOLLAR_TO_POUND_RATE;
        self.memo.insert(
            key,
            MemoEntry {
                value_pounds,
                expires_at: Instant::now() + MEMO_TTL,
            },
        );

        value_pounds
    }
}

#[derive(Debug, Deserialize)]
struct TmvResponse {
    tmv: Tmv,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tmv {
    national_base_price: TmvPrice,
    mileage_adjustment: TmvPrice,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TmvPrice {
    used_tmv_retail: f64,
}

/// Spawn a background task to periodically drop expired valuation memos
pub fn spawn_memo_cleanup_task(source: Arc<EdmundsValuation>) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60);
        loop {
            tokio::time::sleep(interval).await;
            let removed = source.cleanup();
            if removed > 0 {
                debug!("Valuation memo cleanup: removed {} expired entries", removed);
            }
        }
    });
    info!("Valuation memo cleanup task started");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_without_key() -> EdmundsValuation {
        EdmundsValuation::new(&ValuationArgs {
            valuation_url: "https://pricing.invalid/v1".to_string(),
            valuation_api_key: None,
        })
    }

    #[tokio::test]
    async fn test_no_api_key_returns_dummy_uncached() {
        let source = source_without_key();
        assert_eq!(source.vehicle_value("200477465", "10000").await, 6000.0);
        assert_eq!(source.memo.len(), 0);
    }

    #[tokio::test]
    async fn test_memo_hit_skips_lookup() {
        let source = source_without_key();
        source.memo.insert(
            EdmundsValuation::memo_key("200477465", "10000"),
            MemoEntry {
                value_pounds: 4400.0,
                expires_at: Instant::now() + MEMO_TTL,
            },
        );

        assert_eq!(source.vehicle_value("200477465", "10000").await, 4400.0);
    }

    #[tokio::test]
    async fn test_expired_memo_ignored() {
        let source = source_without_key();
        source.memo.insert(
            EdmundsValuation::memo_key("200477465", "10000"),
            MemoEntry {
                value_pounds: 4400.0,
                expires_at: Instant::now() - Duration::from_secs(1),
            },
        );

        // Expired entry falls through to the no-key dummy path
        assert_eq!(source.vehicle_value("200477465", "10000").await, 6000.0);
        assert_eq!(source.cleanup(), 1);
    }

    #[test]
    fn test_tmv_response_parses() {
        let json = r#"{
            "tmv": {
                "nationalBasePrice": {"usedTmvRetail": 5200.0},
                "mileageAdjustment": {"usedTmvRetail": -150.0}
            }
        }"#;
        let body: TmvResponse = serde_json::from_str(json).unwrap();
        let total =
            body.tmv.national_base_price.used_tmv_retail + body.tmv.mileage_adjustment.used_tmv_retail;
        assert_eq!(total, 5050.0);
    }
}
