// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Keeps the deployment document across runs so an interrupted deploy can
// resume and a later `remove` knows what to tear down.
//
// ## Crash Recovery
//
// - Atomic writes: write to `<name>.tmp`, then rename over the state file
// - Automatic backup: the previous document is copied to `<name>.backup`
// - Corruption detection: the file must parse as a JSON object
// - Recovery: falls back to the backup, then to an empty document
//
// ## File Format
//
// The file holds the document as-is, pretty printed:
//
// ```json
// {
//   "domain": "example.com",
//   "aws": { "region": "us-east-1", "s3BucketName": "website-blog-1a2b3c4d" }
// }
// ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::state::DeploymentState;
use crate::traits::state_store::{StateStore, StateStoreFactory};

/// File-based state store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use site_core::state::FileStateStore;
/// use site_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/site/blog.json").await?;
///
///     let mut state = store.get().await?;
///     state.domain = Some("example.com".to_string());
///     store.put(&state).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    document: DeploymentState,
    dirty: bool,
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing document
    /// 3. If it is corrupted, load the backup instead
    /// 4. If both fail, start with an empty document
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create state directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let document = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                document,
                dirty: false,
            })),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<DeploymentState, Error> {
        match Self::load(path).await {
            Ok(document) => {
                tracing::debug!("Loaded state from {}", path.display());
                Ok(document)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "State file appears corrupted: {}. Attempting recovery from backup.",
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty state.");
                    return Ok(DeploymentState::default());
                }

                match Self::load(&backup_path).await {
                    Ok(document) => {
                        tracing::info!("Recovered state from backup {}", backup_path.display());
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore state file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(document)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also corrupted: {}. Starting with empty state.",
                            backup_err
                        );
                        Ok(DeploymentState::default())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<DeploymentState, Error> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(DeploymentState::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            ))
        })?;

        if content.trim().is_empty() {
            return Ok(DeploymentState::default());
        }

        Ok(serde_json::from_str(&content)?)
    }

    async fn write(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;

        let json = serde_json::to_string_pretty(&guard.document)
            .map_err(|e| Error::state_store(format!("Failed to serialize state: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::state_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::state_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        tracing::trace!("State written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self) -> Result<DeploymentState, Error> {
        Ok(self.state.read().await.document.clone())
    }

    async fn put(&self, state: &DeploymentState) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.document = state.clone();
            guard.dirty = true;
        }

        // Immediate write: every completed step must survive a crash
        self.write().await
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write().await } else { Ok(()) }
    }
}

/// Builds a [`FileStateStore`] from a serialized `StateStoreConfig::File`
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &serde_json::Value) -> Result<Box<dyn StateStore>, Error> {
        match serde_json::from_value::<StateStoreConfig>(config.clone())? {
            StateStoreConfig::File { path } => Ok(Box::new(FileStateStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File state store cannot be built from a \"{}\" config",
                other.type_name()
            ))),
        }
    }
}
