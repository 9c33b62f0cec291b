//! Ledger record shapes and static configuration records
//!
//! Query results come back from the peer as JSON and are parsed into these
//! types, so field names mirror the chaincode exactly.

pub mod claim;
pub mod policy;
pub mod user;

pub use claim::{
    normalize_claim_type, Claim, ClaimDetails, GarageReport, OtherParty, Payment, RaiseClaim,
    Settlement,
};
pub use policy::Policy;
pub use user::{UserAttribute, UserRecord, UserRegistry};
