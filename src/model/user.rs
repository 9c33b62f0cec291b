//! Static user registry
//!
//! Loaded once at startup from a JSON file and shared immutably with the
//! services and the settlement orchestrator. Users carrying the `role`
//! attribute value `insurer` are the settlement participants.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::claim::PARTY_TYPE_INSURER;
use crate::types::{AdjusterError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub enrollment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_secret: Option<String>,
    #[serde(default)]
    pub affiliation: String,
    #[serde(default)]
    pub attributes: Vec<UserAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserRecord {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn role(&self) -> Option<&str> {
        self.attribute("role")
    }

    pub fn is_insurer(&self) -> bool {
        self.role() == Some(PARTY_TYPE_INSURER)
    }
}

/// Immutable set of configured users
#[derive(Debug, Clone, Default)]
pub struct UserRegistry {
    users: Vec<UserRecord>,
}

impl UserRegistry {
    /// Load the registry from a JSON file (an array of user records)
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AdjusterError::Config(format!("Cannot read users file {}: {}", path, e))
        })?;
        let users: Vec<UserRecord> = serde_json::from_str(&raw).map_err(|e| {
            AdjusterError::Config(format!("Cannot parse users file {}: {}", path, e))
        })?;

        let registry = Self::from_records(users);
        if registry.insurers().next().is_none() {
            warn!(path = %path, "User registry contains no insurers, settlement will be a no-op");
        }

        Ok(registry)
    }

    pub fn from_records(users: Vec<UserRecord>) -> Self {
        Self { users }
    }

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.enrollment_id == username)
    }

    /// Users whose `role` attribute equals `insurer`
    pub fn insurers(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.iter().filter(|u| u.is_insurer())
    }

    pub fn email_for(&self, username: &str) -> Option<&str> {
        self.get(username)
            .and_then(|u| u.email_address.as_deref())
            .filter(|e| !e.is_empty())
    }

    pub fn device_token_for(&self, username: &str) -> Option<&str> {
        self.get(username)
            .and_then(|u| u.device_token.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> UserRegistry {
        let raw = r#"[
            {
                "enrollmentId": "alice",
                "affiliation": "group1",
                "attributes": [{"name": "username", "value": "alice"}, {"name": "role", "value": "claimant"}],
                "emailAddress": "alice@example.com",
                "deviceToken": "token-alice"
            },
            {
                "enrollmentId": "insurerA",
                "affiliation": "group1",
                "attributes": [{"name": "username", "value": "insurerA"}, {"name": "role", "value": "insurer"}],
                "emailAddress": "claims@insurer-a.example.com"
            },
            {
                "enrollmentId": "garage1",
                "affiliation": "group1",
                "attributes": [{"name": "role", "value": "garage"}],
                "emailAddress": ""
            }
        ]"#;
        let users: Vec<UserRecord> = serde_json::from_str(raw).unwrap();
        UserRegistry::from_records(users)
    }

    #[test]
    fn test_insurers_filtered_by_role_attribute() {
        let registry = sample_registry();
        let insurers: Vec<&str> = registry
            .insurers()
            .map(|u| u.enrollment_id.as_str())
            .collect();
        assert_eq!(insurers, vec!["insurerA"]);
    }

    #[test]
    fn test_email_lookup_skips_empty() {
        let registry = sample_registry();
        assert_eq!(registry.email_for("alice"), Some("alice@example.com"));
        assert_eq!(registry.email_for("garage1"), None);
        assert_eq!(registry.email_for("nobody"), None);
    }

    #[test]
    fn test_device_token_lookup() {
        let registry = sample_registry();
        assert_eq!(registry.device_token_for("alice"), Some("token-alice"));
        assert_eq!(registry.device_token_for("insurerA"), None);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = UserRegistry::load("/nonexistent/users.json").unwrap_err();
        assert!(err.to_string().contains("Cannot read users file"));
    }

    #[test]
    fn test_load_rejects_invalid_json() {
        let path = std::env::temp_dir().join(format!("users-{}.json", std::process::id()));
        std::fs::write(&path, b"{not json").unwrap();

        let err = UserRegistry::load(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Cannot parse users file"));

        let _ = std::fs::remove_file(&path);
    }
}
