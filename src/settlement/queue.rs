//! Bounded settlement queue
//!
//! Decouples "event received" from "settlement executed". The event hub
//! pushes raw ledger events into the channel (dropping with a warning when
//! full); this task drains them one trigger at a time. Per-insurer work
//! inside a single pass still runs concurrently.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{SettlementOrchestrator, SettlementTrigger};
use crate::ledger::LedgerEvent;

/// Depth of the bounded settlement channel
pub const SETTLEMENT_QUEUE_DEPTH: usize = 256;

/// Create the channel connecting the event hub to the settlement task
pub fn settlement_channel() -> (mpsc::Sender<LedgerEvent>, mpsc::Receiver<LedgerEvent>) {
    mpsc::channel(SETTLEMENT_QUEUE_DEPTH)
}

/// Spawn the settlement consumer task
///
/// Runs until the sending side of the channel is dropped. Malformed event
/// payloads are discarded with an error log; they never stall the queue.
pub fn spawn_settlement_queue(
    mut events: mpsc::Receiver<LedgerEvent>,
    orchestrator: Arc<SettlementOrchestrator>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Settlement queue task started");

        while let Some(event) = events.recv().await {
            let trigger = match SettlementTrigger::from_payload(&event.payload) {
                Ok(trigger) => trigger,
                Err(e) => {
                    error!(
                        event = %event.name,
                        "Discarding malformed settlement event: {}", e
                    );
                    continue;
                }
            };

            debug!(
                event = %event.name,
                claim_id = %trigger.claim_id,
                policy_id = %trigger.policy_id,
                "Processing settlement trigger"
            );
            orchestrator.settle(&trigger).await;
        }

        info!("Settlement queue task stopped");
    })
}
