//! Resource provisioners
//!
//! One module per resource. Each function is a reconciliation step over a
//! capability trait; persisting results is left to the caller.
//!
//! - [`storage`]: bucket, hosting configuration, content sync
//! - [`certificate`]: DNS-validated certificate
//! - [`dns`]: hosted zone, validation and alias records
//! - [`cdn`]: distribution lifecycle and invalidation
//! - [`teardown`]: reverse-order removal

pub mod cdn;
pub mod certificate;
pub mod dns;
pub mod storage;
pub mod teardown;

pub use teardown::{TeardownSummary, teardown};
