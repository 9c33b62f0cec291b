//! Garage Report Service
//!
//! Issues garage-assessment transactions against an existing claim.

use std::sync::Arc;
use tracing::debug;

use crate::ledger::LedgerClient;
use crate::model::GarageReport;
use crate::types::Result;

pub struct GarageService {
    ledger: Arc<dyn LedgerClient>,
}

impl GarageService {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Add a garage report to a claim.
    ///
    /// `notes` defaults to "none" and `writeOff` to false when absent.
    pub async fn add_garage_report(
        &self,
        report: &GarageReport,
        acting_user: &str,
    ) -> Result<String> {
        let write_off = report.write_off.unwrap_or(false);
        let notes = report
            .notes
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "none".to_string());

        let args = vec![
            report.claim_id.clone(),
            report.estimated_cost.to_string(),
            write_off.to_string(),
            notes,
            report.vehicle_registration.clone(),
        ];

        debug!(acting_user = %acting_user, claim_id = %report.claim_id, "Adding garage report");
        self.ledger.invoke("addGarageReport", args, acting_user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::testing::MockLedger;

    #[tokio::test]
    async fn test_report_args_with_defaults() {
        let ledger = Arc::new(MockLedger::new());
        let service = GarageService::new(ledger.clone());

        let report = GarageReport {
            claim_id: "C1".to_string(),
            estimated_cost: 1250.0,
            write_off: None,
            notes: None,
            vehicle_registration: "AB12 CDE".to_string(),
        };
        service.add_garage_report(&report, "garage1").await.unwrap();

        let calls = ledger.invoked();
        assert_eq!(calls[0].function, "addGarageReport");
        assert_eq!(
            calls[0].args,
            vec!["C1", "1250", "false", "none", "AB12 CDE"]
        );
    }

    #[tokio::test]
    async fn test_report_args_explicit_fields() {
        let ledger = Arc::new(MockLedger::new());
        let service = GarageService::new(ledger.clone());

        let report = GarageReport {
            claim_id: "C2".to_string(),
            estimated_cost: 9800.5,
            write_off: Some(true),
            notes: Some("front axle bent".to_string()),
            vehicle_registration: "XY99 ZZZ".to_string(),
        };
        service.add_garage_report(&report, "garage1").await.unwrap();

        let calls = ledger.invoked();
        assert_eq!(
            calls[0].args,
            vec!["C2", "9800.5", "true", "front axle bent", "XY99 ZZZ"]
        );
    }
}
