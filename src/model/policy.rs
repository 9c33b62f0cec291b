//! Policy records as returned by `retrieveAllPolicies`

use serde::{Deserialize, Serialize};

/// A policy record. The policyholder sits under `relations`, not `details`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default)]
    pub id: String,
    /// Record discriminator, the constant `policy` on the ledger
    #[serde(rename = "type", default)]
    pub record_type: String,
    #[serde(default)]
    pub details: PolicyDetails,
    #[serde(default)]
    pub relations: PolicyRelations,
}

impl Policy {
    /// Claimant username of the policyholder
    pub fn owner(&self) -> &str {
        &self.relations.owner
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDetails {
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub excess: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRelations {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub insurer: String,
    #[serde(default)]
    pub vehicle: String,
    /// Claim ids raised against this policy, nil slice marshals as null
    #[serde(default)]
    pub claims: Option<Vec<String>>,
}
