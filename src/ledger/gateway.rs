//! Ledger gateway implementation
//!
//! Single-connection client for the peer's transaction interface with lazy
//! connection init. A failed request clears the stored connection so the
//! next call reconnects.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::ledger::connection::PeerConnection;
use crate::ledger::protocol::{self, PeerResponse, PeerStatus};
use crate::ledger::LedgerClient;
use crate::types::{AdjusterError, Result};

pub struct LedgerGateway {
    peer_url: String,
    chaincode_id: String,
    request_timeout_ms: u64,
    /// The single peer connection (lazily initialized)
    connection: RwLock<Option<Arc<PeerConnection>>>,
    /// Lock to prevent concurrent connection attempts
    connecting: Mutex<()>,
    /// Envelope id counter, used for log correlation only
    next_id: AtomicU64,
}

impl LedgerGateway {
    pub fn new(peer_url: &str, chaincode_id: &str, request_timeout_ms: u64) -> Self {
        info!(
            peer_url = %peer_url,
            chaincode_id = %chaincode_id,
            "Ledger gateway created"
        );
        Self {
            peer_url: peer_url.to_string(),
            chaincode_id: chaincode_id.to_string(),
            request_timeout_ms,
            connection: RwLock::new(None),
            connecting: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Establish the peer connection eagerly (startup readiness)
    pub async fn ensure_connected(&self) -> Result<()> {
        self.get_connection().await.map(|_| ())
    }

    /// Get or create the peer connection
    async fn get_connection(&self) -> Result<Arc<PeerConnection>> {
        // Fast path: check if we have a live connection
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                if c.is_connected().await {
                    return Ok(Arc::clone(c));
                }
            }
        }

        // Slow path: need to (re)connect
        let _lock = self.connecting.lock().await;

        // Double-check after acquiring lock
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                if c.is_connected().await {
                    return Ok(Arc::clone(c));
                }
            }
        }

        let conn = Arc::new(PeerConnection::connect(&self.peer_url).await?);

        {
            let mut write_conn = self.connection.write().await;
            *write_conn = Some(Arc::clone(&conn));
        }

        info!("Ledger gateway connected to peer");
        Ok(conn)
    }

    /// Check if currently connected
    pub async fn is_connected(&self) -> bool {
        let conn = self.connection.read().await;
        if let Some(ref c) = *conn {
            c.is_connected().await
        } else {
            false
        }
    }

    async fn transact(&self, fcn: &str, payload: Vec<u8>) -> Result<PeerResponse> {
        let conn = self.get_connection().await?;

        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = protocol::build_request_envelope(request_id, &payload);

        debug!(
            request_id,
            fcn = %fcn,
            "Sending transaction ({} bytes)",
            envelope.len()
        );

        match conn.request(envelope, self.request_timeout_ms).await {
            Ok(response) => parse_terminal_response(&response),
            Err(e) => {
                warn!(fcn = %fcn, "Peer request failed: {}", e);
                // Clear connection so next call reconnects
                let mut write_conn = self.connection.write().await;
                *write_conn = None;
                Err(e)
            }
        }
    }
}

/// Parse a response frame that must be terminal
fn parse_terminal_response(data: &[u8]) -> Result<PeerResponse> {
    let response = protocol::parse_peer_response(data)?;
    match response.status {
        PeerStatus::Complete => Ok(response),
        PeerStatus::Error => Err(AdjusterError::Ledger(
            response
                .message
                .unwrap_or_else(|| "Transaction failed".to_string()),
        )),
        PeerStatus::Submitted => Err(AdjusterError::Ledger(
            "Peer resolved a transaction with a non-terminal status".into(),
        )),
    }
}

#[async_trait]
impl LedgerClient for LedgerGateway {
    async fn invoke(
        &self,
        function: &str,
        args: Vec<String>,
        acting_user: &str,
    ) -> Result<String> {
        let payload =
            protocol::build_invoke_payload(&self.chaincode_id, function, &args, acting_user);
        let response = self.transact(function, payload).await?;
        Ok(response.result.unwrap_or_default())
    }

    async fn query(
        &self,
        function: &str,
        args: Vec<String>,
        acting_user: &str,
    ) -> Result<Vec<u8>> {
        let payload =
            protocol::build_query_payload(&self.chaincode_id, function, &args, acting_user);
        let response = self.transact(function, payload).await?;

        match response.result {
            Some(hex_result) if !hex_result.is_empty() => {
                protocol::decode_query_result(&hex_result)
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_frame(status: &str, result: Option<&str>, message: Option<&str>) -> Vec<u8> {
        use rmpv::Value;

        let mut fields = vec![(
            Value::String("status".into()),
            Value::String(status.into()),
        )];
        if let Some(r) = result {
            fields.push((Value::String("result".into()), Value::String(r.into())));
        }
        if let Some(m) = message {
            fields.push((Value::String("message".into()), Value::String(m.into())));
        }

        let mut inner = Vec::new();
        rmpv::encode::write_value(&mut inner, &Value::Map(fields)).unwrap();

        let envelope = Value::Map(vec![
            (Value::String("id".into()), Value::Integer(1.into())),
            (
                Value::String("type".into()),
                Value::String("response".into()),
            ),
            (Value::String("data".into()), Value::Binary(inner)),
        ]);
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &envelope).unwrap();
        buf
    }

    #[test]
    fn test_terminal_complete_passes_through() {
        let frame = encode_frame("complete", Some("abc123"), None);
        let response = parse_terminal_response(&frame).unwrap();
        assert_eq!(response.result.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_terminal_error_surfaces_message() {
        let frame = encode_frame("error", None, Some("Claim does not exist"));
        let err = parse_terminal_response(&frame).unwrap_err();
        assert_eq!(err.to_string(), "Claim does not exist");
    }

    #[test]
    fn test_submitted_rejected_as_non_terminal() {
        let frame = encode_frame("submitted", None, None);
        assert!(parse_terminal_response(&frame).is_err());
    }
}
