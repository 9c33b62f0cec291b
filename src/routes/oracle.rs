//! HTTP Route for the Vehicle Valuation Oracle
//!
//! - GET /component/oracle/vehicle/{styleId}/value?mileage&requestId&callbackFunction
//!
//! The chaincode itself calls this endpoint while executing a transaction,
//! passing the requestId and the callback function it wants invoked with
//! the looked-up value. Because every endorsing peer executes the same
//! transaction, the same requestId arrives once per peer; the oracle
//! deduplicates so exactly one callback transaction is submitted.
//!
//! No bearer token: the caller is the ledger, not a registered user.

use hyper::{Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::oracle::OracleOutcome;
use crate::routes::respond::{
    cors_preflight, error_response, method_not_allowed, results_response, BoxBody,
};
use crate::server::AppState;

fn parse_oracle_route(path: &str) -> Option<&str> {
    let stripped = path.strip_prefix("/component/oracle/vehicle/")?;
    let parts: Vec<&str> = stripped.split('/').collect();

    match parts.as_slice() {
        [style_id, "value"] if !style_id.is_empty() => Some(style_id),
        _ => None,
    }
}

/// Parse query string into key-value map
fn parse_query_params(query: &str) -> HashMap<String, String> {
    if query.is_empty() {
        return HashMap::new();
    }

    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Handle /component/oracle/* routes. Returns None if not an oracle route.
pub async fn handle_oracle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    if !req.uri().path().starts_with("/component/oracle/") {
        return None;
    }

    if req.method() == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let style_id = match parse_oracle_route(req.uri().path()) {
        Some(style_id) => style_id,
        None => {
            return Some(error_response(
                StatusCode::NOT_FOUND,
                "Oracle endpoint not found",
            ))
        }
    };

    if req.method() != Method::GET {
        return Some(method_not_allowed());
    }

    let params = parse_query_params(req.uri().query().unwrap_or(""));
    let (mileage, request_id, callback_function) = match (
        params.get("mileage"),
        params.get("requestId"),
        params.get("callbackFunction"),
    ) {
        (Some(m), Some(r), Some(c)) if !r.is_empty() && !c.is_empty() => (m, r, c),
        _ => {
            return Some(error_response(
                StatusCode::BAD_REQUEST,
                "Missing required query parameters: mileage, requestId, callbackFunction",
            ))
        }
    };

    info!(
        "Oracle valuation request {} for style {} ({} miles)",
        request_id, style_id, mileage
    );

    // Answer before the lookup completes. The chaincode only needs the
    // HTTP round trip to finish; the result arrives via the callback
    // transaction.
    let message = match state
        .oracle
        .request_valuation(style_id, mileage, request_id, callback_function)
    {
        OracleOutcome::Dispatched => "Valuation lookup dispatched",
        OracleOutcome::Duplicate => "Valuation request already in flight",
    };

    Some(results_response(&message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oracle_route() {
        assert_eq!(
            parse_oracle_route("/component/oracle/vehicle/101381453/value"),
            Some("101381453")
        );
    }

    #[test]
    fn test_parse_oracle_route_invalid() {
        assert!(parse_oracle_route("/component/oracle/vehicle/101381453").is_none());
        assert!(parse_oracle_route("/component/oracle/vehicle//value").is_none());
        assert!(parse_oracle_route("/component/oracle/vehicle/1/value/extra").is_none());
        assert!(parse_oracle_route("/component/other/vehicle/1/value").is_none());
    }

    #[test]
    fn test_parse_query_params() {
        let params = parse_query_params("mileage=23000&requestId=req-7&callbackFunction=callback");
        assert_eq!(params.get("mileage"), Some(&"23000".to_string()));
        assert_eq!(params.get("requestId"), Some(&"req-7".to_string()));
        assert_eq!(params.get("callbackFunction"), Some(&"callback".to_string()));
    }

    #[test]
    fn test_parse_query_params_empty() {
        assert!(parse_query_params("").is_empty());
    }
}
