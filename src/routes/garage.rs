//! HTTP Routes for Garage Assessments
//!
//! - POST /garage/{username}/report - attach a repair assessment to a claim
//!
//! Garage identities submit the estimated repair cost and a write-off
//! verdict after inspecting the vehicle. The report moves the claim out of
//! its awaiting-assessment state on the ledger.

use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::error;

use crate::model::GarageReport;
use crate::routes::auth_routes::authorize_user;
use crate::routes::respond::{
    cors_preflight, error_response, get_auth_header, method_not_allowed, parse_json_body,
    results_response, BoxBody,
};
use crate::server::AppState;

fn parse_garage_route(path: &str) -> Option<&str> {
    let stripped = path.strip_prefix("/garage/")?;
    let parts: Vec<&str> = stripped.split('/').collect();

    match parts.as_slice() {
        [username, "report"] if !username.is_empty() => Some(username),
        _ => None,
    }
}

/// Handle /garage/* routes. Returns None if not a garage route.
pub async fn handle_garage_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    if !req.uri().path().starts_with("/garage/") {
        return None;
    }

    if req.method() == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string for matching
    let path = req.uri().path().to_string();
    let path = path.split('?').next().unwrap_or(&path);

    let username = match parse_garage_route(path) {
        Some(username) => username,
        None => {
            return Some(error_response(
                StatusCode::NOT_FOUND,
                "Garage endpoint not found",
            ))
        }
    };

    if req.method() != Method::POST {
        return Some(method_not_allowed());
    }

    Some(handle_garage_report(req, state, username).await)
}

async fn handle_garage_report(
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

    let body: GarageReport = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid JSON body: {}", e),
            )
        }
    };

    match state.garage.add_garage_report(&body, username).await {
        Ok(receipt) => results_response(&receipt),
        Err(e) => {
            error!(
                "Failed to add garage report to claim {} for {}: {}",
                body.claim_id, username, e
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}
