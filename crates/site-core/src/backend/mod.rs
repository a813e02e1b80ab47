//! Resource backends
//!
//! A backend supplies the four capability clients of a run through a
//! [`ResourceClientsFactory`](crate::traits::ResourceClientsFactory) and is
//! registered by name in the [`BackendRegistry`](crate::registry::BackendRegistry).
//!
//! - [`memory`]: in-process simulated cloud, registered as `memory`

pub mod memory;

pub use memory::{CertificateBehavior, MemoryBackendFactory, MemoryCloud};
