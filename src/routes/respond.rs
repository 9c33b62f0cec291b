//! Response helpers shared by the route handlers
//!
//! Every business route answers with the same JSON envelope: a successful
//! operation wraps its payload as `{"results": ...}` and a failed one as
//! `{"error": ...}`. The mobile and web clients key off those two fields
//! only, so the helpers here are the single place the envelope is built.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::AdjusterError;

pub(crate) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Reported when a failure reaches the client without a usable message
const UNKNOWN_ISSUE: &str = "unknown issue";

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

/// 200 with the payload wrapped as `{"results": ...}`
pub(crate) fn results_response<T: Serialize>(payload: &T) -> Response<BoxBody> {
    let value = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
    json_response(StatusCode::OK, &json!({ "results": value }))
}

/// Error envelope `{"error": ...}`. Blank messages are replaced so the
/// client never renders an empty error field.
pub(crate) fn error_response(status: StatusCode, message: &str) -> Response<BoxBody> {
    let message = if message.trim().is_empty() {
        UNKNOWN_ISSUE
    } else {
        message
    };
    json_response(status, &json!({ "error": message }))
}

pub(crate) fn method_not_allowed() -> Response<BoxBody> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

pub(crate) fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub(crate) fn get_auth_header(req: &Request<hyper::body::Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

pub(crate) async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T, AdjusterError> {
    let body = req
        .collect()
        .await
        .map_err(|e| AdjusterError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(AdjusterError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| AdjusterError::Http(format!("Invalid JSON: {}", e)))
}
