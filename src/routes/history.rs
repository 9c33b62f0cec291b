//! HTTP Routes for Ledger History Reads
//!
//! - GET /caller/{username}/history/claims/all - claims visible to the caller
//! - GET /caller/{username}/history/policies/all - policies visible to the caller
//!
//! Both are full-history queries submitted as the caller, so the ledger's
//! own visibility rules decide what comes back: a claimant sees their own
//! records, an insurer sees every claim on its book.

use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::error;

use crate::routes::auth_routes::authorize_user;
use crate::routes::respond::{
    cors_preflight, error_response, get_auth_header, method_not_allowed, results_response, BoxBody,
};
use crate::server::AppState;

/// Parsed history route components
#[derive(Debug, PartialEq, Eq)]
enum CallerRoute<'a> {
    ClaimsHistory { username: &'a str },
    PoliciesHistory { username: &'a str },
}

fn parse_caller_route(path: &str) -> Option<CallerRoute<'_>> {
    let stripped = path.strip_prefix("/caller/")?;
    let parts: Vec<&str> = stripped.split('/').collect();

    match parts.as_slice() {
        [username, "history", "claims", "all"] if !username.is_empty() => {
            Some(CallerRoute::ClaimsHistory { username })
        }
        [username, "history", "policies", "all"] if !username.is_empty() => {
            Some(CallerRoute::PoliciesHistory { username })
        }
        _ => None,
    }
}

/// Handle /caller/* routes. Returns None if not a caller route.
pub async fn handle_caller_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    if !req.uri().path().starts_with("/caller/") {
        return None;
    }

    if req.method() == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string for matching
    let path = req.uri().path().to_string();
    let path = path.split('?').next().unwrap_or(&path);

    let route = match parse_caller_route(path) {
        Some(route) => route,
        None => {
            return Some(error_response(
                StatusCode::NOT_FOUND,
                "Caller endpoint not found",
            ))
        }
    };

    if req.method() != Method::GET {
        return Some(method_not_allowed());
    }

    let response = match route {
        CallerRoute::ClaimsHistory { username } => handle_claims_history(&req, state, username).await,
        CallerRoute::PoliciesHistory { username } => {
            handle_policies_history(&req, state, username).await
        }
    };

    Some(response)
}

async fn handle_claims_history(
    req: &Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    username: &str,
) -> Response<BoxBody> {
    if let Err(denied) = authorize_user(
        get_auth_header(req),
        &state.jwt,
        state.args.dev_mode,
        username,
    ) {
        return denied;
    }

    match state.claims.full_history(username).await {
        Ok(claims) => results_response(&claims),
        Err(e) => {
            error!("Failed to read claim history for {}: {}", username, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn handle_policies_history(
    req: &Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    username: &str,
) -> Response<BoxBody> {
    if let Err(denied) = authorize_user(
        get_auth_header(req),
        &state.jwt,
        state.args.dev_mode,
        username,
    ) {
        return denied;
    }

    match state.policies.full_history(username).await {
        Ok(policies) => results_response(&policies),
        Err(e) => {
            error!("Failed to read policy history for {}: {}", username, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_claims_history_route() {
        let route = parse_caller_route("/caller/alice/history/claims/all").unwrap();
        assert_eq!(route, CallerRoute::ClaimsHistory { username: "alice" });
    }

    #[test]
    fn test_parse_policies_history_route() {
        let route = parse_caller_route("/caller/insurerA/history/policies/all").unwrap();
        assert_eq!(
            route,
            CallerRoute::PoliciesHistory {
                username: "insurerA"
            }
        );
    }

    #[test]
    fn test_parse_caller_route_invalid() {
        assert!(parse_caller_route("/caller/").is_none());
        assert!(parse_caller_route("/caller/alice/history").is_none());
        assert!(parse_caller_route("/caller/alice/history/claims").is_none());
        assert!(parse_caller_route("/caller//history/claims/all").is_none());
        assert!(parse_caller_route("/caller/alice/history/vehicles/all").is_none());
    }
}
