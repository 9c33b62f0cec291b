//! Claim records and claim-related request bodies
//!
//! The ledger stores claims as JSON; missing sub-objects are defaulted on
//! deserialization because records written at earlier lifecycle stages do
//! not carry `repair` or `settlement` yet. The chaincode serializes empty
//! payment lists as `null`, so `payments` is an Option.

use serde::{Deserialize, Serialize};

use crate::types::{AdjusterError, Result};

// ============================================================================
// Ledger enum values
// ============================================================================

pub const CLAIM_TYPE_SINGLE_PARTY: &str = "single_party";
pub const CLAIM_TYPE_MULTIPLE_PARTIES: &str = "multiple_parties";

pub const PAYMENT_STATUS_PENDING: &str = "pending";
pub const PAYMENT_STATUS_PAID: &str = "paid";

pub const PARTY_TYPE_CLAIMANT: &str = "claimant";
pub const PARTY_TYPE_INSURER: &str = "insurer";

/// Normalize a free-text claim type to the ledger enum.
///
/// Matching is case-insensitive: "Multiple Party" becomes
/// `multiple_parties`, "Single Party" becomes `single_party`. Values already
/// in canonical form pass through unchanged.
pub fn normalize_claim_type(raw: &str) -> Result<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "single party" | CLAIM_TYPE_SINGLE_PARTY => Ok(CLAIM_TYPE_SINGLE_PARTY),
        "multiple party" | CLAIM_TYPE_MULTIPLE_PARTIES => Ok(CLAIM_TYPE_MULTIPLE_PARTIES),
        _ => Err(AdjusterError::Http(format!(
            "Unrecognized claim type: {}",
            raw
        ))),
    }
}

// ============================================================================
// Ledger record shapes
// ============================================================================

/// A claim record as returned by `retrieveAllClaims`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    #[serde(default)]
    pub id: String,
    /// Record discriminator, the constant `claim` on the ledger
    #[serde(rename = "type", default)]
    pub record_type: String,
    #[serde(default)]
    pub details: ClaimDetails,
    #[serde(default)]
    pub relations: ClaimRelations,
}

impl Claim {
    /// Payments list, empty when settlement has not produced any yet
    pub fn payments(&self) -> &[Payment] {
        self.details
            .settlement
            .as_ref()
            .and_then(|s| s.payments.as_deref())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDetails {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub description: String,
    /// Null until an insurer declares liability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liable: Option<bool>,
    #[serde(default)]
    pub incident: Incident,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair: Option<RepairRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(default)]
    pub date: String,
    /// `single_party` or `multiple_parties`
    #[serde(rename = "type", default)]
    pub incident_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairRecord {
    #[serde(default)]
    pub garage: String,
    #[serde(default)]
    pub estimate: i64,
    #[serde(default)]
    pub write_off: bool,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub dispute: bool,
    #[serde(default)]
    pub total_loss: TotalLoss,
    /// The chaincode marshals a nil slice as JSON null
    #[serde(default)]
    pub payments: Option<Vec<Payment>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalLoss {
    #[serde(default)]
    pub car_value_estimate: i64,
    #[serde(default)]
    pub customer_agreed_value: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub sender_type: String,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub recipient_type: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub status: String,
}

impl Payment {
    pub fn is_pending(&self) -> bool {
        self.status == PAYMENT_STATUS_PENDING
    }

    pub fn is_paid(&self) -> bool {
        self.status == PAYMENT_STATUS_PAID
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRelations {
    #[serde(default)]
    pub related_policy: String,
}

// ============================================================================
// Request bodies
// ============================================================================

/// Body of POST /claimant/:username/claim
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseClaim {
    pub related_policy: String,
    pub description: String,
    pub incident_date: String,
    /// Free text, normalized before it reaches the ledger
    #[serde(rename = "type")]
    pub claim_type: String,
    /// Present only for multi-party claims
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_party: Option<OtherParty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherParty {
    pub reg: String,
    #[serde(default)]
    pub at_fault: bool,
}

/// Body of POST /garage/:username/report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GarageReport {
    pub claim_id: String,
    pub estimated_cost: f64,
    #[serde(default)]
    pub write_off: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
    pub vehicle_registration: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_claim_type() {
        assert_eq!(normalize_claim_type("Single Party").unwrap(), "single_party");
        assert_eq!(normalize_claim_type("single party").unwrap(), "single_party");
        assert_eq!(
            normalize_claim_type("MULTIPLE PARTY").unwrap(),
            "multiple_parties"
        );
        assert_eq!(
            normalize_claim_type("single_party").unwrap(),
            "single_party"
        );
        assert_eq!(
            normalize_claim_type("multiple_parties").unwrap(),
            "multiple_parties"
        );
        assert!(normalize_claim_type("third party fire and theft").is_err());
    }

    #[test]
    fn test_claim_parses_minimal_record() {
        // A freshly created claim has no repair or settlement yet
        let json = r#"{
            "id": "C1",
            "type": "claim",
            "details": {
                "status": "awaiting_garage_report",
                "description": "bump",
                "incident": {"date": "2024-01-01", "type": "single_party"}
            },
            "relations": {"relatedPolicy": "P1"}
        }"#;
        let claim: Claim = serde_json::from_str(json).unwrap();
        assert_eq!(claim.id, "C1");
        assert_eq!(claim.relations.related_policy, "P1");
        assert!(claim.details.liable.is_none());
        assert!(claim.payments().is_empty());
    }

    #[test]
    fn test_claim_parses_null_payments() {
        let json = r#"{
            "id": "C2",
            "type": "claim",
            "details": {
                "status": "settled",
                "description": "",
                "incident": {"date": "", "type": ""},
                "settlement": {
                    "decision": "total_loss",
                    "dispute": false,
                    "totalLoss": {"carValueEstimate": 5500, "customerAgreedValue": 5000},
                    "payments": null
                }
            },
            "relations": {"relatedPolicy": "P2"}
        }"#;
        let claim: Claim = serde_json::from_str(json).unwrap();
        assert!(claim.payments().is_empty());
    }

    #[test]
    fn test_claim_parses_payments() {
        let json = r#"{
            "id": "C3",
            "details": {
                "liable": true,
                "settlement": {
                    "payments": [{
                        "id": "pay1",
                        "sender": "insurerA",
                        "senderType": "insurer",
                        "recipient": "alice",
                        "recipientType": "claimant",
                        "amount": 4400,
                        "status": "pending"
                    }]
                }
            }
        }"#;
        let claim: Claim = serde_json::from_str(json).unwrap();
        assert_eq!(claim.details.liable, Some(true));
        let payments = claim.payments();
        assert_eq!(payments.len(), 1);
        assert!(payments[0].is_pending());
        assert_eq!(payments[0].recipient_type, PARTY_TYPE_CLAIMANT);
    }

    #[test]
    fn test_raise_claim_body_multi_party() {
        let json = r#"{
            "relatedPolicy": "P1",
            "description": "collision",
            "incidentDate": "2024-02-02",
            "type": "Multiple Party",
            "otherParty": {"reg": "AB12 CDE", "atFault": true}
        }"#;
        let body: RaiseClaim = serde_json::from_str(json).unwrap();
        let other = body.other_party.unwrap();
        assert_eq!(other.reg, "AB12 CDE");
        assert!(other.at_fault);
    }
}
