//! Write-through view of the deployment document
//!
//! Provisioning steps record their results through a [`StateLedger`], which
//! persists the full document after every change. A crash between two steps
//! therefore leaves the store describing exactly the steps that completed.

use crate::Result;
use crate::state::DeploymentState;
use crate::traits::StateStore;

/// Cached document backed by a [`StateStore`]
pub struct StateLedger<'a> {
    store: &'a dyn StateStore,
    state: DeploymentState,
}

impl<'a> StateLedger<'a> {
    /// Read the current document from the store
    pub async fn load(store: &'a dyn StateStore) -> Result<Self> {
        let state = store.get().await?;
        Ok(Self { store, state })
    }

    /// Current document
    pub fn get(&self) -> &DeploymentState {
        &self.state
    }

    /// Apply `change` and persist the result
    ///
    /// Nothing is written when `change` leaves the document as it was.
    pub async fn update<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut DeploymentState),
    {
        let mut next = self.state.clone();
        change(&mut next);
        if next == self.state {
            return Ok(());
        }
        self.store.put(&next).await?;
        self.state = next;
        Ok(())
    }

    /// Replace the document with an empty one
    pub async fn clear(&mut self) -> Result<()> {
        let empty = DeploymentState::default();
        self.store.put(&empty).await?;
        self.state = empty;
        Ok(())
    }
}
