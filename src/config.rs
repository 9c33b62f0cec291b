//! Configuration for Adjuster
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Adjuster - REST gateway and settlement engine for ledger-backed vehicle insurance
#[derive(Parser, Debug, Clone)]
#[command(name = "adjuster")]
#[command(about = "REST gateway and settlement engine for a permissioned-ledger insurance network")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Ledger peer WebSocket URL for invoke/query transactions
    #[arg(long, env = "PEER_URL", default_value = "ws://localhost:7051")]
    pub peer_url: String,

    /// Ledger event hub WebSocket URL
    /// Peers expose the chaincode event stream on a separate port from the
    /// transaction interface
    #[arg(long, env = "EVENTS_URL", default_value = "ws://localhost:7053")]
    pub events_url: String,

    /// Deployed chaincode identifier targeted by every invoke/query
    #[arg(long, env = "CHAINCODE_ID", default_value = "insurance")]
    pub chaincode_id: String,

    /// Path to the user registry JSON file (claimants, insurers, garages)
    #[arg(long, env = "USERS_FILE", default_value = "config/users.json")]
    pub users_file: String,

    /// Acting identity for oracle callback transactions
    #[arg(long, env = "ORACLE_USER", default_value = "oracle")]
    pub oracle_user: String,

    /// Enable development mode (disables auth, relaxes readiness)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Ledger request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Notification transport configuration
    #[command(flatten)]
    pub notify: NotifyArgs,

    /// Vehicle valuation lookup configuration
    #[command(flatten)]
    pub valuation: ValuationArgs,
}

/// Notification transport endpoints
#[derive(Parser, Debug, Clone)]
pub struct NotifyArgs {
    /// Email bridge endpoint (email notifications disabled when unset)
    #[arg(long, env = "EMAIL_URL")]
    pub email_url: Option<String>,

    /// From-address sent to the email bridge (the bridge ignores it for delivery)
    #[arg(long, env = "EMAIL_FROM", default_value = "no-reply@example.com")]
    pub email_from: String,

    /// Push endpoint (FCM-compatible)
    #[arg(long, env = "PUSH_URL", default_value = "https://fcm.googleapis.com/fcm/send")]
    pub push_url: String,

    /// Push server key (push notifications disabled when unset)
    #[arg(long, env = "PUSH_KEY")]
    pub push_key: Option<String>,
}

/// External vehicle valuation API
#[derive(Parser, Debug, Clone)]
pub struct ValuationArgs {
    /// Pricing API base URL
    #[arg(
        long,
        env = "VALUATION_URL",
        default_value = "https://api.edmunds.com/v1/api/tmv/tmvservice"
    )]
    pub valuation_url: String,

    /// Pricing API key (a fixed fallback value is returned when unset)
    #[arg(long, env = "VALUATION_API_KEY")]
    pub valuation_api_key: Option<String>,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        match self.jwt_secret.as_deref() {
            None if !self.dev_mode => {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            Some(secret) if secret.len() < 32 => {
                return Err("JWT_SECRET must be at least 32 characters".to_string());
            }
            _ => {}
        }

        if self.users_file.trim().is_empty() {
            return Err("USERS_FILE must not be empty".to_string());
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid_in_dev_mode() {
        let args = Args::parse_from(["adjuster", "--dev-mode"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.chaincode_id, "insurance");
        assert!(args.jwt_secret.is_none());
    }

    #[test]
    fn test_production_requires_jwt_secret() {
        let args = Args::parse_from(["adjuster"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from([
            "adjuster",
            "--jwt-secret",
            "a-strong-secret-of-at-least-32-chars",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let args = Args::parse_from(["adjuster", "--jwt-secret", "s3cret"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_notify_args_default_off() {
        let args = Args::parse_from(["adjuster", "--dev-mode"]);
        assert!(args.notify.email_url.is_none());
        assert!(args.notify.push_key.is_none());
    }
}
