//! Claim Service
//!
//! Builds and issues claim-lifecycle transactions and reconstructs claim
//! views from ledger query results. Authorization is enforced ledger-side:
//! the acting user's attributes determine which claims a query returns, so
//! this layer never filters.

use std::sync::Arc;
use tracing::debug;

use crate::ledger::LedgerClient;
use crate::model::claim::{normalize_claim_type, Claim, RaiseClaim};
use crate::types::Result;

pub struct ClaimService {
    ledger: Arc<dyn LedgerClient>,
}

impl ClaimService {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Raise a new claim as the acting user.
    ///
    /// The free-text claim type is normalized to the ledger enum before the
    /// invoke. Multi-party claims append the other party's registration and
    /// stringified fault flag as extra positional args.
    pub async fn raise_claim(&self, claim: &RaiseClaim, acting_user: &str) -> Result<String> {
        let claim_type = normalize_claim_type(&claim.claim_type)?;

        let mut args = vec![
            claim.related_policy.clone(),
            claim.description.clone(),
            claim.incident_date.clone(),
            claim_type.to_string(),
        ];

        if let Some(ref other_party) = claim.other_party {
            args.push(other_party.reg.clone());
            args.push(other_party.at_fault.to_string());
        }

        debug!(acting_user = %acting_user, policy = %claim.related_policy, "Raising claim");
        self.ledger.invoke("createClaim", args, acting_user).await
    }

    /// Full claim history visible to the acting user
    pub async fn full_history(&self, acting_user: &str) -> Result<Vec<Claim>> {
        let raw = self
            .ledger
            .query("retrieveAllClaims", Vec::new(), acting_user)
            .await?;
        parse_history(&raw)
    }

    /// Find one claim by id with a linear scan of the full history.
    ///
    /// A miss is `None`, never an error. O(n) per lookup is accepted; the
    /// ledger offers no indexed claim query.
    pub async fn claim_with_id(
        &self,
        claim_id: &str,
        acting_user: &str,
    ) -> Result<Option<Claim>> {
        let history = self.full_history(acting_user).await?;
        Ok(history.into_iter().find(|c| c.id == claim_id))
    }

    /// Agree the payout amount for a claim
    pub async fn make_claim_agreement(
        &self,
        claim_id: &str,
        agreement: f64,
        acting_user: &str,
    ) -> Result<String> {
        let args = vec![claim_id.to_string(), agreement.to_string()];
        self.ledger
            .invoke("agreePayoutAmount", args, acting_user)
            .await
    }

    /// Declare whether the acting insurer accepts liability for a claim
    pub async fn make_liability_agreement(
        &self,
        claim_id: &str,
        agreement: bool,
        acting_user: &str,
    ) -> Result<String> {
        let args = vec![claim_id.to_string(), agreement.to_string()];
        self.ledger
            .invoke("declareLiability", args, acting_user)
            .await
    }

    /// Mark a payment as paid.
    ///
    /// Not idempotent at the ledger: repeating the confirmation for an
    /// already-paid payment is rejected there. Callers doing redundant
    /// retries classify that rejection as benign rather than fatal.
    pub async fn confirm_paid_out(
        &self,
        claim_id: &str,
        payment_id: &str,
        acting_user: &str,
    ) -> Result<String> {
        let args = vec![claim_id.to_string(), payment_id.to_string()];
        self.ledger.invoke("confirmPaidOut", args, acting_user).await
    }
}

/// Parse a query result as a JSON array, treating empty bytes as empty
fn parse_history(raw: &[u8]) -> Result<Vec<Claim>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::MockLedger;

    fn request(claim_type: &str) -> RaiseClaim {
        RaiseClaim {
            related_policy: "P1".to_string(),
            description: "bump".to_string(),
            incident_date: "2024-01-01".to_string(),
            claim_type: claim_type.to_string(),
            other_party: None,
        }
    }

    #[tokio::test]
    async fn test_raise_claim_normalizes_type() {
        let ledger = Arc::new(MockLedger::new());
        let service = ClaimService::new(ledger.clone());

        service
            .raise_claim(&request("Single Party"), "alice")
            .await
            .unwrap();

        let calls = ledger.invoked();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function, "createClaim");
        assert_eq!(calls[0].acting_user, "alice");
        assert_eq!(
            calls[0].args,
            vec!["P1", "bump", "2024-01-01", "single_party"]
        );
    }

    #[tokio::test]
    async fn test_raise_claim_rejects_unknown_type() {
        let ledger = Arc::new(MockLedger::new());
        let service = ClaimService::new(ledger.clone());

        assert!(service
            .raise_claim(&request("fully comprehensive"), "alice")
            .await
            .is_err());
        assert!(ledger.invoked().is_empty());
    }

    #[tokio::test]
    async fn test_raise_claim_appends_other_party() {
        let ledger = Arc::new(MockLedger::new());
        let service = ClaimService::new(ledger.clone());

        let mut claim = request("Multiple Party");
        claim.other_party = Some(crate::model::OtherParty {
            reg: "AB12 CDE".to_string(),
            at_fault: true,
        });

        service.raise_claim(&claim, "alice").await.unwrap();

        let calls = ledger.invoked();
        assert_eq!(
            calls[0].args,
            vec![
                "P1",
                "bump",
                "2024-01-01",
                "multiple_parties",
                "AB12 CDE",
                "true"
            ]
        );
    }

    #[tokio::test]
    async fn test_claim_with_id_hit_and_miss() {
        let ledger = Arc::new(MockLedger::new());
        ledger.stub_query(
            "retrieveAllClaims",
            br#"[{"id":"C1","details":{}},{"id":"C2","details":{}}]"#,
        );
        let service = ClaimService::new(ledger.clone());

        let found = service.claim_with_id("C2", "alice").await.unwrap();
        assert_eq!(found.unwrap().id, "C2");

        let missing = service.claim_with_id("C9", "alice").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_claim_with_id_empty_history() {
        let ledger = Arc::new(MockLedger::new());
        ledger.stub_query("retrieveAllClaims", b"[]");
        let service = ClaimService::new(ledger.clone());

        assert!(service
            .claim_with_id("C1", "alice")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_history_parses_empty_result_bytes() {
        let ledger = Arc::new(MockLedger::new());
        let service = ClaimService::new(ledger.clone());

        let history = service.full_history("alice").await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_agreement_args_stringified() {
        let ledger = Arc::new(MockLedger::new());
        let service = ClaimService::new(ledger.clone());

        service
            .make_claim_agreement("C1", 500.0, "insurerA")
            .await
            .unwrap();
        service
            .make_liability_agreement("C1", true, "insurerA")
            .await
            .unwrap();

        let calls = ledger.invoked();
        assert_eq!(calls[0].function, "agreePayoutAmount");
        assert_eq!(calls[0].args, vec!["C1", "500"]);
        assert_eq!(calls[1].function, "declareLiability");
        assert_eq!(calls[1].args, vec!["C1", "true"]);
    }

    #[tokio::test]
    async fn test_confirm_paid_out_args() {
        let ledger = Arc::new(MockLedger::new());
        let service = ClaimService::new(ledger.clone());

        service
            .confirm_paid_out("C1", "pay1", "insurerA")
            .await
            .unwrap();

        let calls = ledger.invoked();
        assert_eq!(calls[0].function, "confirmPaidOut");
        assert_eq!(calls[0].args, vec!["C1", "pay1"]);
        assert_eq!(calls[0].acting_user, "insurerA");
    }
}
