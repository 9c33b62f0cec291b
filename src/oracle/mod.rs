//! Vehicle valuation oracle
//!
//! The chaincode cannot reach external pricing services itself, so during a
//! total-loss settlement it fires an HTTP request at this component carrying
//! a requestId and the name of a chaincode function to call back. The
//! lookup and callback run off-request; the HTTP handler answers as soon as
//! the request is claimed.
//!
//! Chaincode retries mean the same requestId can arrive more than once. An
//! in-flight table keyed by requestId guarantees at most one lookup and one
//! callback per id inside the TTL window; claiming an id is a single atomic
//! entry operation, so two simultaneous first requests cannot both win.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::ledger::LedgerClient;
use crate::services::ValuationSource;

/// How long a claimed requestId blocks duplicates
const REQUEST_TTL: Duration = Duration::from_secs(600);

/// Outcome of an oracle valuation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleOutcome {
    /// First sighting of this requestId, the callback was dispatched
    Dispatched,
    /// Duplicate inside the TTL window, another handler owns the callback
    Duplicate,
}

pub struct ValuationOracle {
    ledger: Arc<dyn LedgerClient>,
    valuation: Arc<dyn ValuationSource>,
    oracle_user: String,
    in_flight: DashMap<String, Instant>,
}

impl ValuationOracle {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        valuation: Arc<dyn ValuationSource>,
        oracle_user: String,
    ) -> Self {
        Self {
            ledger,
            valuation,
            oracle_user,
            in_flight: DashMap::new(),
        }
    }

    /// Handle one oracle request
    ///
    /// Returns without blocking on the lookup. On `Dispatched` a background
    /// task performs the valuation and invokes `callback_function` on the
    /// ledger as the oracle identity.
    pub fn request_valuation(
        &self,
        style_id: &str,
        mileage: &str,
        request_id: &str,
        callback_function: &str,
    ) -> OracleOutcome {
        if !self.claim_request(request_id) {
            debug!(
                request_id = %request_id,
                "Duplicate valuation request, callback already owned"
            );
            return OracleOutcome::Duplicate;
        }

        tokio::spawn(run_callback(
            self.ledger.clone(),
            self.valuation.clone(),
            self.oracle_user.clone(),
            style_id.to_string(),
            mileage.to_string(),
            request_id.to_string(),
            callback_function.to_string(),
        ));

        OracleOutcome::Dispatched
    }

    /// Atomically claim a requestId. False when a live claim already exists.
    fn claim_request(&self, request_id: &str) -> bool {
        let now = Instant::now();
        match self.in_flight.entry(request_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() <= now {
                    entry.insert(now + REQUEST_TTL);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now + REQUEST_TTL);
                true
            }
        }
    }

    /// Drop expired in-flight entries, returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.in_flight.len();
        self.in_flight.retain(|_, expires_at| *expires_at > now);
        before - self.in_flight.len()
    }
}

/// Look the vehicle value up and report it back to the chaincode
async fn run_callback(
    ledger: Arc<dyn LedgerClient>,
    valuation: Arc<dyn ValuationSource>,
    oracle_user: String,
    style_id: String,
    mileage: String,
    request_id: String,
    callback_function: String,
) {
    let value = valuation.vehicle_value(&style_id, &mileage).await;

    // The chaincode stores whole pounds, fractional values are truncated
    let args = vec![request_id.clone(), (value as i64).to_string()];
    match ledger.invoke(&callback_function, args, &oracle_user).await {
        Ok(_) => {
            info!(
                request_id = %request_id,
                value = %value,
                "Valuation callback completed"
            );
        }
        Err(e) => {
            error!(request_id = %request_id, "Valuation callback failed: {}", e);
        }
    }
}

/// Spawn a background task to periodically drop expired oracle requests
pub fn spawn_oracle_cleanup_task(oracle: Arc<ValuationOracle>) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60);
        loop {
            tokio::time::sleep(interval).await;
            let removed = oracle.cleanup();
            if removed > 0 {
                debug!("Oracle request cleanup: removed {} expired entries", removed);
            }
        }
    });
    info!("Oracle request cleanup task started");
}
