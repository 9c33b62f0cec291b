//! HTTP Routes for Claimant Actions
//!
//! - POST /claimant/{username}/claim - raise a new claim against a policy
//! - POST /claimant/{username}/claim/{claimId}/payout/agreement - agree a settlement amount
//! - POST /claimant/{username}/claim/{claimId}/liability/agreement - declare liability
//!
//! The username in the path is the ledger identity the transaction is
//! submitted as, so it must match the bearer token (see
//! [`authorize_user`]). Despite the prefix, the agreement routes are also
//! used by insurer identities countering an offer.

use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

use crate::model::RaiseClaim;
use crate::routes::auth_routes::authorize_user;
use crate::routes::respond::{
    cors_preflight, error_response, get_auth_header, method_not_allowed, parse_json_body,
    results_response, BoxBody,
};
use crate::server::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Body of the payout agreement route
#[derive(Debug, Deserialize)]
struct PayoutAgreementBody {
    /// Offered or countered settlement amount
    agreement: f64,
}

/// Body of the liability agreement route
#[derive(Debug, Deserialize)]
struct LiabilityAgreementBody {
    agreement: bool,
}

// =============================================================================
// Route Matching
// =============================================================================

/// Parsed claimant route components
#[derive(Debug, PartialEq, Eq)]
enum ClaimantRoute<'a> {
    RaiseClaim {
        username: &'a str,
    },
    PayoutAgreement {
        username: &'a str,
        claim_id: &'a str,
    },
    LiabilityAgreement {
        username: &'a str,
        claim_id: &'a str,
    },
}

fn parse_claimant_route(path: &str) -> Option<ClaimantRoute<'_>> {
    let stripped = path.strip_prefix("/claimant/")?;
    let parts: Vec<&str> = stripped.split('/').collect();

    match parts.as_slice() {
        [username, "claim"] if !username.is_empty() => {
            Some(ClaimantRoute::RaiseClaim { username })
        }
        [username, "claim", claim_id, "payout", "agreement"]
            if !username.is_empty() && !claim_id.is_empty() =>
        {
            Some(ClaimantRoute::PayoutAgreement { username, claim_id })
        }
        [username, "claim", claim_id, "liability", "agreement"]
            if !username.is_empty() && !claim_id.is_empty() =>
        {
            Some(ClaimantRoute::LiabilityAgreement { username, claim_id })
        }
        _ => None,
    }
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Handle /claimant/* routes. Returns None if not a claimant route.
pub async fn handle_claimant_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    if !req.uri().path().starts_with("/claimant/") {
        return None;
    }

    if req.method() == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string for matching
    let path = req.uri().path().to_string();
    let path = path.split('?').next().unwrap_or(&path);

    let route = match parse_claimant_route(path) {
        Some(route) => route,
        None => {
            return Some(error_response(
                StatusCode::NOT_FOUND,
                "Claimant endpoint not found",
            ))
        }
    };

    if req.method() != Method::POST {
        return Some(method_not_allowed());
    }

    let response = match route {
        ClaimantRoute::RaiseClaim { username } => handle_raise_claim(req, state, username).await,
        ClaimantRoute::PayoutAgreement { username, claim_id } => {
            handle_payout_agreement(req, state, username, claim_id).await
        }
        ClaimantRoute::LiabilityAgreement { username, claim_id } => {
            handle_liability_agreement(req, state, username, claim_id).await
        }
    };

    Some(response)
}

async fn handle_raise_claim(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    username: &str,
) -> Response<BoxBody> {
    if let Err(denied) = authorize_user(
        get_auth_header(&req),
        &state.jwt,
        state.args.dev_mode,
        username,
    ) {
        return denied;
    }

    let body: RaiseClaim = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid JSON body: {}", e),
            )
        }
    };

    match state.claims.raise_claim(&body, username).await {
        Ok(receipt) => results_response(&receipt),
        Err(e) => {
            error!("Failed to raise claim for {}: {}", username, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn handle_payout_agreement(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    username: &str,
    claim_id: &str,
) -> Response<BoxBody> {
    if let Err(denied) = authorize_user(
        get_auth_header(&req),
        &state.jwt,
        state.args.dev_mode,
        username,
    ) {
        return denied;
    }

    let body: PayoutAgreementBody = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid JSON body: {}", e),
            )
        }
    };

    match state
        .claims
        .make_claim_agreement(claim_id, body.agreement, username)
        .await
    {
        Ok(receipt) => results_response(&receipt),
        Err(e) => {
            error!(
                "Failed to agree payout on claim {} for {}: {}",
                claim_id, username, e
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

async fn handle_liability_agreement(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    username: &str,
    claim_id: &str,
) -> Response<BoxBody> {
    if let Err(denied) = authorize_user(
        get_auth_header(&req),
        &state.jwt,
        state.args.dev_mode,
        username,
    ) {
        return denied;
    }

    let body: LiabilityAgreementBody = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid JSON body: {}", e),
            )
        }
    };

    match state
        .claims
        .make_liability_agreement(claim_id, body.agreement, username)
        .await
    {
        Ok(receipt) => results_response(&receipt),
        Err(e) => {
            error!(
                "Failed to declare liability on claim {} for {}: {}",
                claim_id, username, e
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
