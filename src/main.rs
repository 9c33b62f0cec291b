//! Adjuster - REST gateway and settlement engine for a permissioned-ledger
//! vehicle insurance network

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adjuster::{
    auth::JwtValidator,
    config::Args,
    ledger::{EventHub, LedgerClient, LedgerGateway},
    model::UserRegistry,
    notify::Notifier,
    oracle::{spawn_oracle_cleanup_task, ValuationOracle},
    server,
    services::{spawn_memo_cleanup_task, ClaimService, EdmundsValuation, PolicyService},
    settlement::{
        settlement_channel, settlement_event_names, spawn_settlement_queue,
        SettlementOrchestrator,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("adjuster={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Adjuster - Insurance Claims Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("Peer: {}", args.peer_url);
    info!("Event hub: {}", args.events_url);
    info!("Chaincode: {}", args.chaincode_id);
    info!("Users file: {}", args.users_file);
    info!("Oracle identity: {}", args.oracle_user);
    info!("======================================");

    // User registry backs login checks and notification address lookups
    let users = match UserRegistry::load(&args.users_file) {
        Ok(registry) => {
            info!("User registry loaded: {} users", registry.len());
            Arc::new(registry)
        }
        Err(e) => {
            error!(
                "Failed to load user registry from {}: {}",
                args.users_file, e
            );
            std::process::exit(1);
        }
    };

    // Token signing; validate() already requires a secret outside dev mode
    let jwt = match args.jwt_secret.clone() {
        Some(secret) => match JwtValidator::new(secret, args.jwt_expiry_seconds) {
            Ok(jwt) => jwt,
            Err(e) => {
                error!("JWT configuration error: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            warn!("JWT_SECRET not set, using dev-mode signing key");
            JwtValidator::new_dev()
        }
    };

    // Transaction connection to the ledger peer (optional in dev mode)
    let gateway = Arc::new(LedgerGateway::new(
        &args.peer_url,
        &args.chaincode_id,
        args.request_timeout_ms,
    ));
    match gateway.ensure_connected().await {
        Ok(()) => info!("Ledger peer connected: {}", args.peer_url),
        Err(e) => {
            if args.dev_mode {
                warn!(
                    "Ledger peer connection failed (dev mode, continuing without): {}",
                    e
                );
            } else {
                error!("Ledger peer connection failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    let ledger: Arc<dyn LedgerClient> = gateway.clone();

    // Notification transports for paid-out claims
    let notifier = Arc::new(Notifier::from_args(&args.notify, Arc::clone(&users)));

    // Vehicle valuation source with memoized lookups
    let valuation = Arc::new(EdmundsValuation::new(&args.valuation));
    spawn_memo_cleanup_task(Arc::clone(&valuation));

    // Oracle callback dispatch with requestId dedup
    let oracle = Arc::new(ValuationOracle::new(
        Arc::clone(&ledger),
        valuation,
        args.oracle_user.clone(),
    ));
    spawn_oracle_cleanup_task(Arc::clone(&oracle));

    // Settlement pipeline: event hub -> queue -> orchestrator
    let orchestrator = Arc::new(SettlementOrchestrator::new(
        ClaimService::new(Arc::clone(&ledger)),
        PolicyService::new(Arc::clone(&ledger)),
        Arc::clone(&users),
        notifier,
    ));
    let (event_tx, event_rx) = settlement_channel();
    let _settlement = spawn_settlement_queue(event_rx, Arc::clone(&orchestrator));

    let event_hub = match EventHub::connect(
        &args.events_url,
        &args.chaincode_id,
        settlement_event_names(),
        event_tx,
    )
    .await
    {
        Ok(hub) => {
            info!("Event hub connected: {}", args.events_url);
            Some(Arc::new(hub))
        }
        Err(e) => {
            if args.dev_mode {
                warn!(
                    "Event hub connection failed (dev mode, settlement disabled): {}",
                    e
                );
                None
            } else {
                error!("Event hub connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Release event registrations before the process exits
    if let Some(ref hub) = event_hub {
        let hub = Arc::clone(hub);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received, releasing event registrations");
                hub.shutdown().await;
                std::process::exit(0);
            }
        });
    }

    // Create application state
    let state = Arc::new(server::AppState::new(
        args, users, jwt, gateway, event_hub, oracle,
    ));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
