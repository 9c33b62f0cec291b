//! Authentication for the REST surface
//!
//! Provides:
//! - JWT token generation and validation
//! - Credential checks against the static user registry

pub mod jwt;

use crate::model::UserRecord;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};

/// Check a login attempt against a registry record
///
/// Users without an enrollment secret exist for ledger-side identities
/// enrolled out of band (the oracle, chaincode-registered garages); they
/// can only log in when dev mode is on.
pub fn verify_credentials(user: &UserRecord, password: &str, dev_mode: bool) -> bool {
    match user.enrollment_secret.as_deref() {
        Some(secret) => secret == password,
        None => dev_mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserAttribute;

    fn user(secret: Option<&str>) -> UserRecord {
        UserRecord {
            enrollment_id: "alice".to_string(),
            enrollment_secret: secret.map(str::to_string),
            affiliation: "group1".to_string(),
            attributes: vec![UserAttribute {
                name: "role".to_string(),
                value: "claimant".to_string(),
            }],
            email_address: None,
            device_token: None,
        }
    }

    #[test]
    fn test_secret_must_match() {
        let record = user(Some("CaSJg17PVaDn"));
        assert!(verify_credentials(&record, "CaSJg17PVaDn", false));
        assert!(!verify_credentials(&record, "wrong", false));
        // Dev mode does not bypass a configured secret
        assert!(!verify_credentials(&record, "wrong", true));
    }

    #[test]
    fn test_secretless_user_requires_dev_mode() {
        let record = user(None);
        assert!(!verify_credentials(&record, "anything", false));
        assert!(verify_credentials(&record, "anything", true));
    }
}
