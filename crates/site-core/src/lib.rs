// # site-core
//
// Core library for the static website deployment reconciler.
//
// ## Architecture Overview
//
// A deployment is a bucket serving a website, a CDN distribution in front of
// it and, when a custom domain is configured, a DNS hosted zone and a TLS
// certificate. Repeated runs converge on that topology without duplicating
// or orphaning resources:
// - **Resolver**: Merges user config, persisted state and defaults; refuses breaking changes
// - **Provisioners**: One reconciliation step per resource, written against capability traits
// - **StateLedger**: Persists the deployment document after every completed step
// - **SiteEngine**: Orders the steps for deploy, info and remove
// - **BackendRegistry**: Plugin-based registry for resource backends and state stores
//
// ## Design Principles
//
// 1. **Resumable**: A run that stops halfway picks up at the first unrecorded step
// 2. **Idempotent**: Steps short-circuit when the resource already matches
// 3. **Drift-aware**: A recorded resource that vanished fails loudly instead of being recreated
// 4. **Library-First**: The CLI only wires configuration into the engine

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod provision;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use backend::{MemoryBackendFactory, MemoryCloud};
pub use config::{Action, EngineConfig, ExecutionRequest, SiteConfig, StateStoreConfig};
pub use engine::{EngineEvent, SiteEngine, Step};
pub use error::{Error, Result};
pub use registry::BackendRegistry;
pub use report::ExecutionReport;
pub use resolver::DesiredConfig;
pub use state::{DeploymentState, FileStateStore, MemoryStateStore, StateLedger};
pub use traits::{CredentialProvider, ResourceClients, ResourceClientsFactory, StateStore};
