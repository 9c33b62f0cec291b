//! Settlement pass execution
//!
//! A settlement pass fans out over every configured insurer identity because
//! claims are insurer-scoped on the ledger: each insurer only sees its own
//! payment line items, so the orchestrator cannot know in advance which
//! insurers are party to the claim. Insurers that are not involved simply
//! find nothing to do, which is steady-state behavior rather than an error.

use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::SettlementTrigger;
use crate::model::claim::{PARTY_TYPE_CLAIMANT, PARTY_TYPE_INSURER};
use crate::model::{Claim, Payment, UserRegistry};
use crate::notify::ClaimNotifier;
use crate::services::{ClaimService, PolicyService};

pub struct SettlementOrchestrator {
    claims: ClaimService,
    policies: PolicyService,
    registry: Arc<UserRegistry>,
    notifier: Arc<dyn ClaimNotifier>,
}

impl SettlementOrchestrator {
    pub fn new(
        claims: ClaimService,
        policies: PolicyService,
        registry: Arc<UserRegistry>,
        notifier: Arc<dyn ClaimNotifier>,
    ) -> Self {
        Self {
            claims,
            policies,
            registry,
            notifier,
        }
    }

    /// Run one settlement pass for a trigger
    ///
    /// Every (claim, insurer) pair is attempted concurrently and failures
    /// stay local to their pair. Nothing is reported back to the event
    /// source.
    pub async fn settle(&self, trigger: &SettlementTrigger) {
        let insurers: Vec<&str> = self
            .registry
            .insurers()
            .map(|u| u.enrollment_id.as_str())
            .collect();
        if insurers.is_empty() {
            warn!("No insurer users configured, settlement pass skipped");
            return;
        }

        let mut claim_ids = vec![trigger.claim_id.as_str()];
        if let Some(linked) = trigger.linked_claim_id.as_deref() {
            claim_ids.push(linked);
        }

        let mut passes = Vec::with_capacity(insurers.len() * claim_ids.len());
        for insurer in &insurers {
            for claim_id in &claim_ids {
                passes.push(self.settle_for_insurer(claim_id, insurer));
            }
        }
        join_all(passes).await;
    }

    /// Attempt settlement of one claim as one insurer
    async fn settle_for_insurer(&self, claim_id: &str, insurer: &str) {
        let claim = match self.claims.claim_with_id(claim_id, insurer).await {
            Ok(Some(claim)) => claim,
            Ok(None) => {
                debug!(
                    claim_id = %claim_id,
                    insurer = %insurer,
                    "Claim not visible to insurer, skipping"
                );
                return;
            }
            Err(e) => {
                error!(
                    claim_id = %claim_id,
                    insurer = %insurer,
                    "Failed to fetch claim for settlement: {}", e
                );
                return;
            }
        };

        let payments = claim.payments();
        if payments.is_empty() {
            debug!(
                claim_id = %claim_id,
                insurer = %insurer,
                "Claim has no payments yet, skipping"
            );
            return;
        }

        for payment in payments
            .iter()
            .filter(|p| p.sender == insurer && p.is_pending())
        {
            if !payout_gate_open(&claim, insurer) {
                debug!(
                    claim_id = %claim_id,
                    insurer = %insurer,
                    payment_id = %payment.id,
                    "Liability gate closed, payment stays pending"
                );
                continue;
            }
            self.confirm_payment(&claim, payment, insurer).await;
        }
    }

    async fn confirm_payment(&self, claim: &Claim, payment: &Payment, insurer: &str) {
        match self
            .claims
            .confirm_paid_out(&claim.id, &payment.id, insurer)
            .await
        {
            Ok(_) => {
                info!(
                    claim_id = %claim.id,
                    payment_id = %payment.id,
                    insurer = %insurer,
                    "Payment confirmed as paid"
                );
                if payment.recipient_type == PARTY_TYPE_CLAIMANT {
                    self.notify_policy_owner(claim, insurer).await;
                }
            }
            Err(e) => {
                let message = e.to_string();
                if is_benign_confirmation_error(&message) {
                    debug!(
                        claim_id = %claim.id,
                        payment_id = %payment.id,
                        "Payment already settled by an earlier pass: {}", message
                    );
                } else {
                    error!(
                        claim_id = %claim.id,
                        payment_id = %payment.id,
                        insurer = %insurer,
                        "Failed to confirm payment: {}", message
                    );
                }
            }
        }
    }

    /// Tell the policy owner their claim paid out
    ///
    /// The policy is re-derived from the claim itself rather than the
    /// trigger, since linked claims belong to a different policy than the
    /// one the event names.
    async fn notify_policy_owner(&self, claim: &Claim, insurer: &str) {
        let policy_id = claim.relations.related_policy.as_str();
        if policy_id.is_empty() {
            warn!(claim_id = %claim.id, "Claim has no related policy, owner not notified");
            return;
        }

        match self.policies.policy_with_id(policy_id, insurer).await {
            Ok(Some(policy)) => {
                self.notifier
                    .notify_claim_paid(&claim.id, policy.owner())
                    .await;
            }
            Ok(None) => {
                warn!(
                    claim_id = %claim.id,
                    policy_id = %policy_id,
                    "Related policy not found, owner not notified"
                );
            }
            Err(e) => {
                error!(
                    claim_id = %claim.id,
                    policy_id = %policy_id,
                    "Failed to fetch policy for notification: {}", e
                );
            }
        }
    }
}

/// Payment-ordering gate for multi-party chains
///
/// An insurer may pay out only once it is liable for the claim, or once it
/// has itself been paid by the upstream liable insurer.
fn payout_gate_open(claim: &Claim, insurer: &str) -> bool {
    if claim.details.liable == Some(true) {
        return true;
    }
    claim.payments().iter().any(|p| {
        p.recipient == insurer && p.sender_type == PARTY_TYPE_INSURER && p.is_paid()
    })
}

/// Ledger rejections meaning the payment was settled by an earlier pass.
/// At-least-once event delivery makes these routine, not failures.
fn is_benign_confirmation_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already paid") || lower.contains("not pending")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::MockLedger;
    use crate::model::{UserAttribute, UserRecord};
    use crate::settlement::EVENT_CLAIM_SETTLED;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(String, String)>>,
    }

    impl RecordingNotifier {
        fn notified(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClaimNotifier for RecordingNotifier {
        async fn notify_claim_paid(&self, claim_id: &str, policy_owner: &str) {
            self.calls
                .lock()
                .unwrap()
                .push((claim_id.to_string(), policy_owner.to_string()));
        }
    }

    fn insurer_record(id: &str) -> UserRecord {
        UserRecord {
            enrollment_id: id.to_string(),
            enrollment_secret: None,
            affiliation: String::new(),
            attributes: vec![UserAttribute {
                name: "role".to_string(),
                value: "insurer".to_string(),
            }],
            email_address: None,
            device_token: None,
        }
    }

    fn orchestrator_with(
        ledger: &Arc<MockLedger>,
        insurers: &[&str],
    ) -> (SettlementOrchestrator, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = Arc::new(UserRegistry::from_records(
            insurers.iter().map(|id| insurer_record(id)).collect(),
        ));
        let orchestrator = SettlementOrchestrator::new(
            ClaimService::new(ledger.clone()),
            PolicyService::new(ledger.clone()),
            registry,
            notifier.clone(),
        );
        (orchestrator, notifier)
    }

    fn payment(
        id: &str,
        sender: &str,
        sender_type: &str,
        recipient: &str,
        recipient_type: &str,
        status: &str,
    ) -> Value {
        json!({
            "id": id,
            "sender": sender,
            "senderType": sender_type,
            "recipient": recipient,
            "recipientType": recipient_type,
            "amount": 500,
            "status": status
        })
    }

    fn claim_fixture(id: &str, liable: Value, payments: Value) -> Value {
        json!({
            "id": id,
            "type": "claim",
            "details": {
                "status": "settled",
                "description": "rear end bump",
                "liable": liable,
                "settlement": {"decision": "accepted", "payments": payments}
            },
            "relations": {"relatedPolicy": "P1"}
        })
    }

    fn stub_claims(ledger: &MockLedger, claims: Value) {
        ledger.stub_query("retrieveAllClaims", &serde_json::to_vec(&claims).unwrap());
    }

    fn stub_policy_p1(ledger: &MockLedger) {
        let history = json!([{
            "id": "P1",
            "type": "policy",
            "details": {"startDate": "2024-01-01", "endDate": "2025-01-01", "excess": 500},
            "relations": {"owner": "alice", "insurer": "insurerA", "vehicle": "AB12 CDE", "claims": ["C1"]}
        }]);
        ledger.stub_query(
            "retrieveAllPolicies",
            &serde_json::to_vec(&history).unwrap(),
        );
    }

    fn trigger(claim_id: &str) -> SettlementTrigger {
        SettlementTrigger {
            event_type: EVENT_CLAIM_SETTLED.to_string(),
            claim_id: claim_id.to_string(),
            policy_id: "P1".to_string(),
            linked_claim_id: None,
        }
    }

    #[tokio::test]
    async fn test_gate_blocks_insurer_without_liability() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture(
                "C1",
                json!(false),
                json!([payment("pay1", "insurerA", "insurer", "alice", "claimant", "pending")]),
            )]),
        );
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C1")).await;

        assert!(ledger.invoked().is_empty());
        assert!(notifier.notified().is_empty());
    }

    #[tokio::test]
    async fn test_gate_opens_after_upstream_insurer_payment() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture(
                "C1",
                json!(false),
                json!([
                    payment("pay1", "insurerB", "insurer", "insurerA", "insurer", "paid"),
                    payment("pay2", "insurerA", "insurer", "bob", "claimant", "pending"),
                ]),
            )]),
        );
        stub_policy_p1(&ledger);
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C1")).await;

        let confirms = ledger.invoked_fn("confirmPaidOut");
        assert_eq!(confirms.len(), 1);
        assert_eq!(confirms[0].args, vec!["C1", "pay2"]);
        assert_eq!(confirms[0].acting_user, "insurerA");
        assert_eq!(
            notifier.notified(),
            vec![("C1".to_string(), "alice".to_string())]
        );
    }

    #[tokio::test]
    async fn test_liable_insurer_pays_and_owner_notified_once() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture(
                "C1",
                json!(true),
                json!([payment("pay1", "insurerA", "insurer", "alice", "claimant", "pending")]),
            )]),
        );
        stub_policy_p1(&ledger);
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C1")).await;

        let confirms = ledger.invoked_fn("confirmPaidOut");
        assert_eq!(confirms.len(), 1);
        assert_eq!(confirms[0].args, vec!["C1", "pay1"]);
        assert_eq!(confirms[0].acting_user, "insurerA");
        assert_eq!(
            notifier.notified(),
            vec![("C1".to_string(), "alice".to_string())]
        );
    }

    #[tokio::test]
    async fn test_insurer_facing_payment_sends_no_notification() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture(
                "C1",
                json!(true),
                json!([payment("pay1", "insurerA", "insurer", "insurerB", "insurer", "pending")]),
            )]),
        );
        stub_policy_p1(&ledger);
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C1")).await;

        assert_eq!(ledger.invoked_fn("confirmPaidOut").len(), 1);
        assert!(notifier.notified().is_empty());
    }

    #[tokio::test]
    async fn test_already_settled_rejection_is_benign() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture(
                "C1",
                json!(true),
                json!([payment("pay1", "insurerA", "insurer", "alice", "claimant", "pending")]),
            )]),
        );
        stub_policy_p1(&ledger);
        ledger.fail_invoke("confirmPaidOut", "Payment with id pay1 has already been paid");
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C1")).await;

        // Attempted once, but the stale confirmation must not notify anyone
        assert_eq!(ledger.invoked_fn("confirmPaidOut").len(), 1);
        assert!(notifier.notified().is_empty());
    }

    #[tokio::test]
    async fn test_failure_for_one_insurer_stays_isolated() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture(
                "C1",
                json!(true),
                json!([
                    payment("pay1", "insurerA", "insurer", "alice", "claimant", "pending"),
                    payment("pay2", "insurerB", "insurer", "bob", "claimant", "pending"),
                ]),
            )]),
        );
        stub_policy_p1(&ledger);
        ledger.fail_invoke_for("confirmPaidOut", "insurerA", "peer unavailable");
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA", "insurerB"]);

        orchestrator.settle(&trigger("C1")).await;

        // Both insurers attempt their own payment; only B's confirmation
        // lands and produces the owner notification
        assert_eq!(ledger.invoked_fn("confirmPaidOut").len(), 2);
        assert_eq!(
            notifier.notified(),
            vec![("C1".to_string(), "alice".to_string())]
        );
    }

    #[tokio::test]
    async fn test_linked_claim_settled_in_same_pass() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([
                claim_fixture(
                    "C1",
                    json!(true),
                    json!([payment("pay1", "insurerA", "insurer", "alice", "claimant", "pending")]),
                ),
                claim_fixture(
                    "C2",
                    json!(true),
                    json!([payment("pay2", "insurerA", "insurer", "carol", "claimant", "pending")]),
                ),
            ]),
        );
        stub_policy_p1(&ledger);
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        let mut linked = trigger("C1");
        linked.linked_claim_id = Some("C2".to_string());
        orchestrator.settle(&linked).await;

        let confirms = ledger.invoked_fn("confirmPaidOut");
        assert_eq!(confirms.len(), 2);
        let mut confirmed: Vec<Vec<String>> = confirms.into_iter().map(|c| c.args).collect();
        confirmed.sort();
        assert_eq!(
            confirmed,
            vec![
                vec!["C1".to_string(), "pay1".to_string()],
                vec!["C2".to_string(), "pay2".to_string()],
            ]
        );
        assert_eq!(notifier.notified().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_claim_is_silent_skip() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(&ledger, json!([]));
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C404")).await;

        assert!(ledger.invoked().is_empty());
        assert!(notifier.notified().is_empty());
    }

    #[tokio::test]
    async fn test_claim_without_payments_is_skipped() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture("C1", json!(true), json!(null))]),
        );
        let (orchestrator, _) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C1")).await;

        assert!(ledger.invoked().is_empty());
    }

    #[tokio::test]
    async fn test_paid_payment_is_not_reconfirmed() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture(
                "C1",
                json!(true),
                json!([payment("pay1", "insurerA", "insurer", "alice", "claimant", "paid")]),
            )]),
        );
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C1")).await;

        assert!(ledger.invoked().is_empty());
        assert!(notifier.notified().is_empty());
    }

    #[tokio::test]
    async fn test_missing_policy_skips_notification_only() {
        let ledger = Arc::new(MockLedger::new());
        stub_claims(
            &ledger,
            json!([claim_fixture(
                "C1",
                json!(true),
                json!([payment("pay1", "insurerA", "insurer", "alice", "claimant", "pending")]),
            )]),
        );
        // No policy history stubbed: lookup comes back empty
        let (orchestrator, notifier) = orchestrator_with(&ledger, &["insurerA"]);

        orchestrator.settle(&trigger("C1")).await;

        assert_eq!(ledger.invoked_fn("confirmPaidOut").len(), 1);
        assert!(notifier.notified().is_empty());
    }

    #[tokio::test]
    async fn test_no_insurers_configured_is_noop() {
        let ledger = Arc::new(MockLedger::new());
        let (orchestrator, notifier) = orchestrator_with(&ledger, &[]);

        orchestrator.settle(&trigger("C1")).await;

        assert!(ledger.queried().is_empty());
        assert!(ledger.invoked().is_empty());
        assert!(notifier.notified().is_empty());
    }

    #[test]
    fn test_benign_error_classification() {
        assert!(is_benign_confirmation_error(
            "Payment with id pay1 has already been paid"
        ));
        assert!(is_benign_confirmation_error("Payment is not pending"));
        assert!(!is_benign_confirmation_error("peer unavailable"));
        assert!(!is_benign_confirmation_error("Claim does not exist"));
    }
}
