// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Holds the deployment document for the lifetime of the process. Used by
// tests and rehearsal runs against the simulated backend.
//
// Clones share the same document, so a test can keep a handle while the
// engine owns another one.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::state::DeploymentState;
use crate::traits::state_store::{StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// # Example
///
/// ```rust,no_run
/// use site_core::state::MemoryStateStore;
/// use site_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///
///     let mut state = store.get().await?;
///     state.domain = Some("example.com".to_string());
///     store.put(&state).await?;
///     assert_eq!(store.put_count(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<DeploymentState>>,
    puts: Arc<AtomicUsize>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a document
    pub fn with_state(state: DeploymentState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
            puts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `put` calls so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Snapshot of the current document
    pub async fn snapshot(&self) -> DeploymentState {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self) -> Result<DeploymentState, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn put(&self, state: &DeploymentState) -> Result<(), Error> {
        *self.inner.write().await = state.clone();
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing is buffered
        Ok(())
    }
}

/// Builds an empty [`MemoryStateStore`]
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, _config: &serde_json::Value) -> Result<Box<dyn StateStore>, Error> {
        Ok(Box::new(MemoryStateStore::new()))
    }
}
