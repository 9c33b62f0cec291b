//! Ledger Gateway
//!
//! Wraps the two ledger primitives (`invoke`, `query`) plus the chaincode
//! event subscription. Owns the connection state to the peer; callers get no
//! retry policy here, a failed call surfaces as an error.

pub mod connection;
pub mod events;
pub mod gateway;
pub mod protocol;

pub use connection::PeerConnection;
pub use events::EventHub;
pub use gateway::LedgerGateway;
pub use protocol::LedgerEvent;

use async_trait::async_trait;

use crate::types::Result;

/// Invoke/query access to the ledger.
///
/// Services and the settlement orchestrator depend on this trait rather than
/// the concrete gateway so they can be exercised against a recording mock.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// State-changing ledger call. All arguments are strings; numeric and
    /// boolean values are stringified by the caller before this boundary.
    /// Resolves on the terminal `complete`/`error` status, never on
    /// `submitted`.
    async fn invoke(&self, function: &str, args: Vec<String>, acting_user: &str)
        -> Result<String>;

    /// Read-only ledger call. Returns the decoded result bytes, which the
    /// caller parses as JSON.
    async fn query(&self, function: &str, args: Vec<String>, acting_user: &str)
        -> Result<Vec<u8>>;
}
