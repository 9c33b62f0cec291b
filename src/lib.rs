//! Adjuster - REST gateway and settlement engine for a permissioned-ledger
//! vehicle insurance network
//!
//! The gateway fronts the insurance chaincode with a small REST surface:
//! claimants raise claims, garages file repair assessments, insurers and
//! claimants agree settlements. A chaincode event stream drives the
//! settlement engine, which confirms pending payments for liable insurers
//! and notifies policy holders when their claim pays out.
//!
//! ## Services
//!
//! - **Ledger**: WebSocket peer connection for invoke/query plus the
//!   chaincode event hub
//! - **Routes**: the REST surface (auth, claimant, garage, caller, oracle)
//! - **Settlement**: event-driven payout confirmation
//! - **Oracle**: vehicle valuation callbacks for chaincode requests
//! - **Notify**: email and push delivery for paid-out claims

pub mod auth;
pub mod config;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod oracle;
pub mod routes;
pub mod server;
pub mod services;
pub mod settlement;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AdjusterError, Result};
