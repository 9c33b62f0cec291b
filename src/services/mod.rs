//! Business services
//!
//! Thin translation layers between HTTP request shapes and positional
//! ledger transaction arguments. Every argument crossing the gateway
//! boundary is a string; numeric and boolean values are stringified here.
//!
//! ## Services
//!
//! - **ClaimService**: claim lifecycle transactions and history views
//! - **PolicyService**: read-side policy lookups
//! - **GarageService**: garage assessment reports against existing claims
//! - **ValuationSource**: external vehicle pricing with a TTL memo cache

pub mod claims;
pub mod garage;
pub mod policies;
pub mod valuation;

pub use claims::ClaimService;
pub use garage::GarageService;
pub use policies::PolicyService;
pub use valuation::{spawn_memo_cleanup_task, EdmundsValuation, ValuationSource};
