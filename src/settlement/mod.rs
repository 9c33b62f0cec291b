//! Event-driven settlement engine
//!
//! ## Overview
//!
//! The ledger emits chaincode events whenever a claim reaches a state where
//! payments may be confirmable. This module:
//! 1. Decodes those events into settlement triggers
//! 2. Queues triggers through a bounded channel (back-pressure instead of
//!    unbounded task spawning)
//! 3. Runs a settlement pass per trigger, fanning out across all configured
//!    insurer identities
//!
//! ## Delivery model
//!
//! Event delivery is at-least-once and arrival order is arbitrary. Every
//! pass therefore re-derives claim state from the ledger instead of trusting
//! the event payload, and treats already-settled payments as benign no-ops.

pub mod orchestrator;
pub mod queue;

use serde::Deserialize;

use crate::types::Result;

pub use orchestrator::SettlementOrchestrator;
pub use queue::{settlement_channel, spawn_settlement_queue, SETTLEMENT_QUEUE_DEPTH};

/// Chaincode events that start a settlement pass
pub const EVENT_CLAIM_SETTLED: &str = "ClaimSettled";
pub const EVENT_INSURER_PAYMENT_ADDED: &str = "InsurerPaymentAdded";
pub const EVENT_INSURER_PAYMENT_PAID: &str = "InsurerPaymentPaid";

/// Event names to register with the event hub at startup
pub fn settlement_event_names() -> Vec<String> {
    vec![
        EVENT_CLAIM_SETTLED.to_string(),
        EVENT_INSURER_PAYMENT_ADDED.to_string(),
        EVENT_INSURER_PAYMENT_PAID.to_string(),
    ]
}

/// Decoded payload of a settlement event
///
/// All three event types share this shape. `linked_claim_id` is only set by
/// `ClaimSettled` in the two-insurer liability-transfer case; the chaincode
/// sends an empty string when there is no linked claim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementTrigger {
    #[serde(default)]
    pub event_type: String,
    pub claim_id: String,
    #[serde(default)]
    pub policy_id: String,
    #[serde(default)]
    pub linked_claim_id: Option<String>,
}

impl SettlementTrigger {
    /// Decode a trigger from a raw event payload
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut trigger: SettlementTrigger = serde_json::from_slice(payload)?;
        trigger.linked_claim_id = trigger.linked_claim_id.filter(|id| !id.is_empty());
        Ok(trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_decodes_linked_claim() {
        let trigger = SettlementTrigger::from_payload(
            br#"{"eventType":"ClaimSettled","claimId":"C1","policyId":"P1","linkedClaimId":"C2"}"#,
        )
        .unwrap();
        assert_eq!(trigger.event_type, EVENT_CLAIM_SETTLED);
        assert_eq!(trigger.claim_id, "C1");
        assert_eq!(trigger.policy_id, "P1");
        assert_eq!(trigger.linked_claim_id.as_deref(), Some("C2"));
    }

    #[test]
    fn test_trigger_treats_empty_linked_claim_as_absent() {
        let trigger = SettlementTrigger::from_payload(
            br#"{"eventType":"InsurerPaymentPaid","claimId":"C1","policyId":"P1","linkedClaimId":""}"#,
        )
        .unwrap();
        assert_eq!(trigger.linked_claim_id, None);
    }

    #[test]
    fn test_trigger_tolerates_missing_linked_claim() {
        let trigger = SettlementTrigger::from_payload(
            br#"{"eventType":"InsurerPaymentAdded","claimId":"C9","policyId":"P9"}"#,
        )
        .unwrap();
        assert_eq!(trigger.claim_id, "C9");
        assert_eq!(trigger.linked_claim_id, None);
    }

    #[test]
    fn test_trigger_rejects_garbage_payload() {
        assert!(SettlementTrigger::from_payload(b"not json").is_err());
        assert!(SettlementTrigger::from_payload(br#"{"policyId":"P1"}"#).is_err());
    }
}
