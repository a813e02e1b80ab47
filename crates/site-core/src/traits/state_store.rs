// # State Store Trait
//
// Defines the interface for the persisted deployment document.
//
// ## Purpose
//
// The state store is what makes deployments resumable: the reconciler writes
// the whole `DeploymentState` after every successful provisioning step, so an
// interrupted run leaves state consistent with the last completed step.
//
// ## Implementations
//
// - File-based: JSON file with atomic writes and a backup copy
// - In-memory: for tests and rehearsals
//
// ## Usage
//
// ```rust,ignore
// use site_core::StateStore;
//
// let mut state = store.get().await?;
// state.domain = Some("example.com".to_string());
// store.put(&state).await?;
// ```

use async_trait::async_trait;

use crate::state::DeploymentState;

/// Trait for state store implementations
///
/// Implementations are treated as strongly consistent: a `get` issued after a
/// successful `put` observes that `put`.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Round-tripping
///
/// The document may carry keys written by sibling features. Stores must hand
/// back exactly what was put, unknown keys included.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the deployment document
    ///
    /// # Returns
    ///
    /// - `Ok(DeploymentState)`: The stored document, or an empty one if
    ///   nothing was stored yet
    /// - `Err(Error)`: Storage error
    async fn get(&self) -> Result<DeploymentState, crate::Error>;

    /// Replace the deployment document
    ///
    /// Must be durable when it returns.
    async fn put(&self, state: &DeploymentState) -> Result<(), crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Serialized [`StateStoreConfig`](crate::config::StateStoreConfig)
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn StateStore>, crate::Error>;
}
