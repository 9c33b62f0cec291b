//! HTTP routes for the adjuster gateway

pub mod auth_routes;
pub mod claims;
pub mod garage;
pub mod health;
pub mod history;
pub mod oracle;
pub mod respond;

pub use auth_routes::{authorize_user, handle_auth_request};
pub use claims::handle_claimant_request;
pub use garage::handle_garage_request;
pub use health::{health_check, readiness_check, version_info};
pub use history::handle_caller_request;
pub use oracle::handle_oracle_request;
