//! HTTP Routes for Authentication
//!
//! - POST /auth/login - Exchange registry credentials for a JWT
//!
//! Every other route group calls [`authorize_user`] to check that the
//! bearer token was issued to the username embedded in the request path.
//! Dev mode skips the check entirely so local clients can poke the API
//! without logging in first.

use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{extract_token_from_header, verify_credentials, JwtValidator};
use crate::routes::respond::{
    cors_preflight, error_response, method_not_allowed, parse_json_body, results_response, BoxBody,
};
use crate::server::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    /// Unix timestamp after which the token is rejected
    pub expires_at: u64,
}

// =============================================================================
// Authorization Guard
// =============================================================================

/// Check that the request carries a token issued to `username`.
///
/// Returns the response to send when the check fails: 401 for a missing or
/// invalid token, 403 when the token belongs to a different user. Dev mode
/// admits every request.
pub fn authorize_user(
    auth_header: Option<&str>,
    jwt: &JwtValidator,
    dev_mode: bool,
    username: &str,
) -> Result<(), Response<BoxBody>> {
    if dev_mode {
        return Ok(());
    }

    let token = match extract_token_from_header(auth_header) {
        Some(token) => token,
        None => {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "Missing bearer token",
            ))
        }
    };

    let result = jwt.verify_token(token);
    let claims = match result.claims {
        Some(claims) if result.valid => claims,
        _ => {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                result.error.as_deref().unwrap_or("Invalid token"),
            ))
        }
    };

    if claims.sub != username {
        warn!(
            "Rejected request for {} with a token issued to {}",
            username, claims.sub
        );
        return Err(error_response(
            StatusCode::FORBIDDEN,
            "Token does not match the acting user",
        ));
    }

    Ok(())
}

// =============================================================================
// Route Handlers
// =============================================================================

/// Handle /auth/* routes. Returns None if not an auth route.
pub async fn handle_auth_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    if !path.starts_with("/auth") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string for matching
    let path = path.split('?').next().unwrap_or(path);

    let response = match (method, path) {
        (&Method::POST, "/auth/login") => handle_login(req, state).await,

        // Method not allowed
        (_, "/auth/login") => method_not_allowed(),

        // Auth endpoint not found
        _ => error_response(StatusCode::NOT_FOUND, "Auth endpoint not found"),
    };

    Some(response)
}

/// POST /auth/login
///
/// Check the credentials against the user registry and mint a token. The
/// failure message is the same whether the user is unknown or the password
/// wrong, so callers cannot enumerate usernames.
async fn handle_login(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid JSON body: {}", e),
            )
        }
    };

    if body.username.is_empty() || body.password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: username, password",
        );
    }

    let user = match state.users.get(&body.username) {
        Some(user) => user,
        None => {
            warn!("Login failed - user not found: {}", body.username);
            return error_response(StatusCode::UNAUTHORIZED, "Invalid username or password");
        }
    };

    if !verify_credentials(user, &body.password, state.args.dev_mode) {
        warn!("Login failed - bad credentials: {}", body.username);
        return error_response(StatusCode::UNAUTHORIZED, "Invalid username or password");
    }

    let role = user.role().unwrap_or("claimant");
    let (token, expires_at) = match state.jwt.generate_token(&body.username, role) {
        Ok(pair) => pair,
        Err(e) => {
            warn!("Token generation failed for {}: {}", body.username, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate token");
        }
    };

    info!("Login: {} ({})", body.username, role);

    results_response(&LoginResponse {
        token,
        username: body.username,
        expires_at,
    })
}
