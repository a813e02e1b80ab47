//! Test doubles and common utilities for reconciler contract tests
//!
//! Every contract test reconciles against a [`MemoryCloud`] with all delays
//! set to zero.

#![allow(dead_code)]

use async_trait::async_trait;
use site_core::backend::{MemoryBackendFactory, MemoryCloud};
use site_core::error::Result;
use site_core::state::DeploymentState;
use site_core::traits::{Credentials, StaticCredentialProvider, StateStore};
use site_core::{EngineConfig, EngineEvent, MemoryStateStore, SiteEngine};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Engine settings with every delay zeroed
pub fn fast_config(workspace_root: &Path) -> EngineConfig {
    EngineConfig {
        bucket_poll_delay_ms: 0,
        hosting_retry_delay_ms: 0,
        certificate_settle_delay_ms: 0,
        certificate_poll_delay_ms: 0,
        viewer_certificate_backoff_ms: 0,
        viewer_certificate_backoff_cap_ms: 0,
        distribution_poll_delay_ms: 0,
        ..EngineConfig::default()
    }
    .with_workspace_root(workspace_root)
}

pub fn test_credentials() -> Credentials {
    Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG", None).expect("valid credentials")
}

/// Build an engine over `store`, bound to `cloud`
pub fn engine_with_store(
    cloud: &MemoryCloud,
    store: Box<dyn StateStore>,
    workspace_root: &Path,
) -> (SiteEngine, mpsc::Receiver<EngineEvent>) {
    SiteEngine::new(
        store,
        Box::new(StaticCredentialProvider::new(test_credentials())),
        Arc::new(MemoryBackendFactory::new(cloud.clone())),
        fast_config(workspace_root),
    )
    .expect("engine construction succeeds")
}

/// One simulated account, one deployment document and a workspace directory
pub struct Harness {
    pub cloud: MemoryCloud,
    pub store: MemoryStateStore,
    pub workspace: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_state(DeploymentState::default())
    }

    pub fn with_state(state: DeploymentState) -> Self {
        Self {
            cloud: MemoryCloud::new(),
            store: MemoryStateStore::with_state(state),
            workspace: tempfile::tempdir().expect("temp workspace"),
        }
    }

    /// A fresh engine sharing this harness' cloud and document
    pub fn engine(&self) -> SiteEngine {
        let (engine, _events) =
            engine_with_store(&self.cloud, Box::new(self.store.clone()), self.workspace.path());
        engine
    }

    /// Current deployment document
    pub async fn state(&self) -> DeploymentState {
        self.store.snapshot().await
    }

    /// Write `files` (relative path, content) under `dir` inside the workspace
    pub fn write_site(&self, dir: &str, files: &[(&str, &str)]) {
        for (path, content) in files {
            let full = self.workspace.path().join(dir).join(path);
            std::fs::create_dir_all(full.parent().expect("file has a parent"))
                .expect("create site directory");
            std::fs::write(full, content).expect("write site file");
        }
    }
}

/// A state store that fails every put after the first `allowed` ones
///
/// Simulates a crash between two persisted steps.
pub struct InterruptingStateStore {
    inner: MemoryStateStore,
    allowed: usize,
    puts: Arc<AtomicUsize>,
}

impl InterruptingStateStore {
    pub fn new(inner: MemoryStateStore, allowed: usize) -> Self {
        Self {
            inner,
            allowed,
            puts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of puts attempted, including the refused ones
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for InterruptingStateStore {
    async fn get(&self) -> Result<DeploymentState> {
        self.inner.get().await
    }

    async fn put(&self, state: &DeploymentState) -> Result<()> {
        let attempt = self.puts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.allowed {
            return Err(site_core::Error::state_store("simulated crash"));
        }
        self.inner.put(state).await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }
}
