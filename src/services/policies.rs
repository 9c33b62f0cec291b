//! Policy Service
//!
//! Read-side policy lookups. Settlement uses these to resolve the
//! policyholder for a claim's related policy.

use std::sync::Arc;

use crate::ledger::LedgerClient;
use crate::model::Policy;
use crate::types::Result;

pub struct PolicyService {
    ledger: Arc<dyn LedgerClient>,
}

impl PolicyService {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Full policy history visible to the acting user
    pub async fn full_history(&self, acting_user: &str) -> Result<Vec<Policy>> {
        let raw = self
            .ledger
            .query("retrieveAllPolicies", Vec::new(), acting_user)
            .await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Find one policy by id, same linear-scan contract as claims
    pub async fn policy_with_id(
        &self,
        policy_id: &str,
        acting_user: &str,
    ) -> Result<Option<Policy>> {
        let history = self.full_history(acting_user).await?;
        Ok(history.into_iter().find(|p| p.id == policy_id))
    }
}
