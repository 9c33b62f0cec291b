//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. One task per
//! connection; every task shares the same [`AppState`].

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::ledger::{EventHub, LedgerClient, LedgerGateway};
use crate::model::UserRegistry;
use crate::oracle::ValuationOracle;
use crate::routes;
use crate::services::{ClaimService, GarageService, PolicyService};
use crate::types::AdjusterError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// User registry backing login checks and notification address lookups
    pub users: Arc<UserRegistry>,
    /// Token validation for the guarded route groups
    pub jwt: JwtValidator,
    /// Shared peer connection, also the readiness signal
    pub gateway: Arc<LedgerGateway>,
    /// Chaincode event stream handle, None when the hub never came up
    /// (dev mode without a ledger)
    pub event_hub: Option<Arc<EventHub>>,
    pub claims: ClaimService,
    pub policies: PolicyService,
    pub garage: GarageService,
    pub oracle: Arc<ValuationOracle>,
    /// Process start, reported as uptime by the health probes
    pub started: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        users: Arc<UserRegistry>,
        jwt: JwtValidator,
        gateway: Arc<LedgerGateway>,
        event_hub: Option<Arc<EventHub>>,
        oracle: Arc<ValuationOracle>,
    ) -> Self {
        let ledger: Arc<dyn LedgerClient> = gateway.clone();

        Self {
            claims: ClaimService::new(Arc::clone(&ledger)),
            policies: PolicyService::new(Arc::clone(&ledger)),
            garage: GarageService::new(ledger),
            args,
            users,
            jwt,
            gateway,
            event_hub,
            oracle,
            started: Instant::now(),
        }
    }
}

/// Run the HTTP server until the process is stopped
pub async fn run(state: Arc<AppState>) -> Result<(), AdjusterError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Adjuster listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - authentication disabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Business route groups consume the request
    if path.starts_with("/auth") {
        if let Some(response) = routes::handle_auth_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    if path.starts_with("/claimant/") {
        if let Some(response) = routes::handle_claimant_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    if path.starts_with("/garage/") {
        if let Some(response) = routes::handle_garage_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    if path.starts_with("/caller/") {
        if let Some(response) = routes::handle_caller_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    if path.starts_with("/component/oracle/") {
        if let Some(response) = routes::handle_oracle_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    let response = match (method, path.as_str()) {
        // Liveness probe - returns 200 if the process is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)).await)
        }

        // Readiness probe - returns 200 only if the ledger peer is connected
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(Arc::clone(&state)).await)
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "Business routes live under /claimant, /garage, /caller"
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
