//! Plugin-based backend registry
//!
//! Resource backends and state stores are registered by name at runtime and
//! selected from configuration, without if-else chains over known types.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use site_core::registry::BackendRegistry;
//!
//! let registry = BackendRegistry::with_builtin();
//! let clients = registry.create_clients("memory", &credentials, "us-east-1")?;
//! let store = registry.create_state_store(&StateStoreConfig::Memory).await?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::MemoryBackendFactory;
use crate::config::StateStoreConfig;
use crate::error::{Error, Result};
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::traits::{Credentials, ResourceClients, ResourceClientsFactory};
use crate::traits::{StateStore, StateStoreFactory};

type Factories<T> = RwLock<HashMap<String, Arc<T>>>;

fn read<T: ?Sized>(map: &Factories<T>) -> RwLockReadGuard<'_, HashMap<String, Arc<T>>> {
    map.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T: ?Sized>(map: &Factories<T>) -> RwLockWriteGuard<'_, HashMap<String, Arc<T>>> {
    map.write().unwrap_or_else(|e| e.into_inner())
}

/// Registry of resource backends and state stores
///
/// ## Thread Safety
///
/// Interior mutability through `RwLock`: concurrent lookups, exclusive
/// registration.
#[derive(Default)]
pub struct BackendRegistry {
    /// Registered resource backend factories
    backends: Factories<dyn ResourceClientsFactory>,

    /// Registered state store factories
    state_stores: Factories<dyn StateStoreFactory>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `memory` backend and the `file`
    /// and `memory` state stores
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_backend("memory", Box::new(MemoryBackendFactory::default()));
        registry.register_state_store("file", Box::new(FileStateStoreFactory));
        registry.register_state_store("memory", Box::new(MemoryStateStoreFactory));
        registry
    }

    /// Register a resource backend
    ///
    /// # Parameters
    ///
    /// - `name`: Backend name (e.g., "memory")
    /// - `factory`: Builds the resource clients of a run
    pub fn register_backend(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ResourceClientsFactory>,
    ) {
        write(&self.backends).insert(name.into(), Arc::from(factory));
    }

    /// Register a state store factory
    ///
    /// # Parameters
    ///
    /// - `name`: State store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating state store instances
    pub fn register_state_store(&self, name: impl Into<String>, factory: Box<dyn StateStoreFactory>) {
        write(&self.state_stores).insert(name.into(), Arc::from(factory));
    }

    /// Look up a backend factory
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn ResourceClientsFactory>)`: The registered factory
    /// - `Err(Error)`: If no backend of that name is registered
    pub fn backend(&self, name: &str) -> Result<Arc<dyn ResourceClientsFactory>> {
        read(&self.backends)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown backend type: {}", name)))
    }

    /// Create the resource clients of one run
    pub fn create_clients(
        &self,
        name: &str,
        credentials: &Credentials,
        region: &str,
    ) -> Result<ResourceClients> {
        self.backend(name)?.create(credentials, region)
    }

    /// Create a state store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn StateStore>)`: Created state store instance
    /// - `Err(Error)`: If store type is not registered or creation fails
    pub async fn create_state_store(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
        let store_type = config.type_name();

        // Clone the factory out so no lock is held across the await
        let factory = read(&self.state_stores)
            .get(store_type)
            .cloned()
            .ok_or_else(|| Error::config(format!("Unknown state store type: {}", store_type)))?;

        let config_json = serde_json::to_value(config)?;
        factory.create(&config_json).await
    }

    /// List all registered backend names
    pub fn list_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.backends).keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.state_stores).keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a backend is registered
    pub fn has_backend(&self, name: &str) -> bool {
        read(&self.backends).contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        read(&self.state_stores).contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl ResourceClientsFactory for FailingBackend {
        fn create(&self, _credentials: &Credentials, _region: &str) -> Result<ResourceClients> {
            Err(Error::config("backend unavailable"))
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "secret", None).unwrap()
    }

    #[test]
    fn test_registry_registration() {
        let registry = BackendRegistry::new();
        assert!(!registry.has_backend("failing"));

        registry.register_backend("failing", Box::new(FailingBackend));

        assert!(registry.has_backend("failing"));
        assert_eq!(registry.list_backends(), vec!["failing".to_string()]);
        assert!(registry.create_clients("failing", &credentials(), "us-east-1").is_err());
    }

    #[test]
    fn test_unknown_backend_is_config_error() {
        let registry = BackendRegistry::with_builtin();
        let err = registry
            .create_clients("cloudformation", &credentials(), "us-east-1")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(registry.create_clients("memory", &credentials(), "us-east-1").is_ok());
    }

    #[tokio::test]
    async fn test_builtin_state_stores() {
        let registry = BackendRegistry::with_builtin();
        assert_eq!(
            registry.list_state_stores(),
            vec!["file".to_string(), "memory".to_string()]
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = registry
            .create_state_store(&StateStoreConfig::File {
                path: path.to_string_lossy().into_owned(),
            })
            .await
            .unwrap();
        assert!(store.get().await.unwrap().is_empty());
    }
}
