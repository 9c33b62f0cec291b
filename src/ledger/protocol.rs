//! Peer wire protocol
//!
//! The peer speaks MessagePack envelopes over WebSocket. Outbound requests
//! are `{id, type: "request", data: <binary>}` where the binary payload is a
//! nested map `{type: "invoke"|"query"|..., value: {...}}`. Responses carry
//! `{status: "submitted"|"complete"|"error", result?, message?}` in the same
//! nested layout. Query results are hex-encoded JSON.

use rmpv::Value;
use std::io::Cursor;

use crate::types::{AdjusterError, Result};

/// Ledger-side attributes released to the chaincode with every transaction
pub const TX_ATTRS: [&str; 2] = ["username", "role"];

pub const STATUS_SUBMITTED: &str = "submitted";
pub const STATUS_COMPLETE: &str = "complete";
pub const STATUS_ERROR: &str = "error";

/// Terminal or informational status of a peer response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Submitted,
    Complete,
    Error,
}

/// Decoded peer response
#[derive(Debug, Clone)]
pub struct PeerResponse {
    pub status: PeerStatus,
    pub result: Option<String>,
    pub message: Option<String>,
}

/// A chaincode event pushed by the event hub
#[derive(Debug, Clone)]
pub struct LedgerEvent {
    pub name: String,
    pub payload: Vec<u8>,
}

/// Build an `invoke` transaction payload
pub fn build_invoke_payload(
    chaincode_id: &str,
    fcn: &str,
    args: &[String],
    acting_user: &str,
) -> Vec<u8> {
    build_tx_payload("invoke", chaincode_id, fcn, args, acting_user)
}

/// Build a `query` transaction payload
pub fn build_query_payload(
    chaincode_id: &str,
    fcn: &str,
    args: &[String],
    acting_user: &str,
) -> Vec<u8> {
    build_tx_payload("query", chaincode_id, fcn, args, acting_user)
}

fn build_tx_payload(
    tx_type: &str,
    chaincode_id: &str,
    fcn: &str,
    args: &[String],
    acting_user: &str,
) -> Vec<u8> {
    let args = Value::Array(args.iter().map(|a| Value::String(a.as_str().into())).collect());
    let attrs = Value::Array(
        TX_ATTRS
            .iter()
            .map(|a| Value::String((*a).into()))
            .collect(),
    );

    let value = Value::Map(vec![
        (
            Value::String("chaincodeID".into()),
            Value::String(chaincode_id.into()),
        ),
        (Value::String("fcn".into()), Value::String(fcn.into())),
        (Value::String("args".into()), args),
        (Value::String("attrs".into()), attrs),
        (
            Value::String("actingUser".into()),
            Value::String(acting_user.into()),
        ),
    ]);

    let inner = Value::Map(vec![
        (Value::String("type".into()), Value::String(tx_type.into())),
        (Value::String("value".into()), value),
    ]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &inner).expect("Failed to encode transaction payload");
    buf
}

/// Build an event-registration payload for the event hub connection
pub fn build_register_event_payload(chaincode_id: &str, event_name: &str) -> Vec<u8> {
    let value = Value::Map(vec![
        (
            Value::String("chaincodeID".into()),
            Value::String(chaincode_id.into()),
        ),
        (
            Value::String("eventName".into()),
            Value::String(event_name.into()),
        ),
    ]);

    let inner = Value::Map(vec![
        (
            Value::String("type".into()),
            Value::String("register_event".into()),
        ),
        (Value::String("value".into()), value),
    ]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &inner).expect("Failed to encode register_event payload");
    buf
}

/// Build an unregistration payload releasing one event registration
pub fn build_unregister_event_payload(registration_id: &str) -> Vec<u8> {
    let value = Value::Map(vec![(
        Value::String("registrationId".into()),
        Value::String(registration_id.into()),
    )]);

    let inner = Value::Map(vec![
        (
            Value::String("type".into()),
            Value::String("unregister_event".into()),
        ),
        (Value::String("value".into()), value),
    ]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &inner).expect("Failed to encode unregister_event payload");
    buf
}

/// Build the request envelope wrapping an inner payload
pub fn build_request_envelope(id: u64, inner_data: &[u8]) -> Vec<u8> {
    let envelope = Value::Map(vec![
        (Value::String("id".into()), Value::Integer(id.into())),
        (
            Value::String("type".into()),
            Value::String("request".into()),
        ),
        (
            Value::String("data".into()),
            Value::Binary(inner_data.to_vec()),
        ),
    ]);

    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &envelope).expect("Failed to encode envelope");
    buf
}

/// Parse a peer response envelope into status/result/message
pub fn parse_peer_response(data: &[u8]) -> Result<PeerResponse> {
    let mut cursor = Cursor::new(data);
    let value = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| AdjusterError::Ledger(format!("Failed to decode response: {}", e)))?;

    let map = match value {
        Value::Map(ref map) => map,
        _ => {
            return Err(AdjusterError::Ledger(
                "Unexpected peer response format".into(),
            ))
        }
    };

    let inner_bytes = match get_field(map, "data") {
        Some(Value::Binary(bytes)) => bytes.as_slice(),
        _ => {
            return Err(AdjusterError::Ledger(
                "Peer response missing data field".into(),
            ))
        }
    };

    let mut inner_cursor = Cursor::new(inner_bytes);
    let inner = rmpv::decode::read_value(&mut inner_cursor)
        .map_err(|e| AdjusterError::Ledger(format!("Failed to decode inner response: {}", e)))?;

    let inner_map = match inner {
        Value::Map(ref map) => map,
        _ => {
            return Err(AdjusterError::Ledger(
                "Unexpected inner response format".into(),
            ))
        }
    };

    let status = match get_string_field(inner_map, "status").as_deref() {
        Some(STATUS_SUBMITTED) => PeerStatus::Submitted,
        Some(STATUS_COMPLETE) => PeerStatus::Complete,
        Some(STATUS_ERROR) => PeerStatus::Error,
        other => {
            return Err(AdjusterError::Ledger(format!(
                "Unknown peer response status: {:?}",
                other
            )))
        }
    };

    Ok(PeerResponse {
        status,
        result: get_string_field(inner_map, "result"),
        message: get_string_field(inner_map, "message"),
    })
}

/// Whether a frame is an informational `submitted` response.
///
/// Submitted frames keep the pending transaction waiting; only
/// `complete`/`error` resolve it. Anything unparsable is not `submitted` so
/// the decode error surfaces to the waiting caller instead.
pub fn is_submitted_frame(data: &[u8]) -> bool {
    matches!(
        parse_peer_response(data),
        Ok(PeerResponse {
            status: PeerStatus::Submitted,
            ..
        })
    )
}

/// Parse an event-hub push frame `{type: "event", value: {eventName, payload}}`
pub fn parse_event_frame(data: &[u8]) -> Option<LedgerEvent> {
    let mut cursor = Cursor::new(data);
    let value = rmpv::decode::read_value(&mut cursor).ok()?;

    let map = match value {
        Value::Map(ref map) => map,
        _ => return None,
    };

    if get_string_field(map, "type").as_deref() != Some("event") {
        return None;
    }

    let event_value = match get_field(map, "value") {
        Some(Value::Map(inner)) => inner,
        _ => return None,
    };

    let name = get_string_field(event_value, "eventName")?;
    let payload = match get_field(event_value, "payload") {
        Some(Value::Binary(bytes)) => bytes.clone(),
        Some(Value::String(s)) => s.as_bytes().to_vec(),
        _ => return None,
    };

    Some(LedgerEvent { name, payload })
}

/// Decode a hex-encoded query result into raw JSON bytes
pub fn decode_query_result(hex_str: &str) -> Result<Vec<u8>> {
    hex::decode(hex_str.trim())
        .map_err(|e| AdjusterError::Ledger(format!("Invalid hex in query result: {}", e)))
}

/// Get a string field from a MessagePack map
fn get_string_field(map: &[(Value, Value)], key: &str) -> Option<String> {
    for (k, v) in map {
        if let Value::String(k_str) = k {
            if k_str.as_str() == Some(key) {
                if let Value::String(v_str) = v {
                    return v_str.as_str().map(|s| s.to_string());
                }
            }
        }
    }
    None
}

/// Get a field from a MessagePack map
fn get_field<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    for (k, v) in map {
        if let Value::String(k_str) = k {
            if k_str.as_str() == Some(key) {
                return Some(v);
            }
        }
    }
    None
}
