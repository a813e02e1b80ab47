//! Core traits for the site reconciler
//!
//! This module defines the abstract interfaces the reconciler is written against.
//!
//! - [`ObjectStorage`]: Buckets, objects and website hosting
//! - [`Cdn`]: Distributions and cache invalidations
//! - [`Dns`]: Hosted zones and record sets
//! - [`CertificateAuthority`]: DNS-validated TLS certificates
//! - [`StateStore`]: Persistent deployment document
//! - [`CredentialProvider`]: Cloud credentials for a run

pub mod cdn;
pub mod certificate;
pub mod credentials;
pub mod dns;
pub mod object_storage;
pub mod state_store;

use std::sync::Arc;

pub use cdn::{Cdn, Distribution, DistributionConfig, DistributionStatus, ViewerCertificate};
pub use certificate::{CertificateAuthority, CertificateDetail, CertificateStatus};
pub use credentials::{CredentialProvider, Credentials, EnvCredentialProvider, StaticCredentialProvider};
pub use dns::{ChangeAction, ChangeBatch, Dns, RecordSet, RecordType};
pub use object_storage::{ObjectStorage, PutObjectRequest, WebsiteConfiguration};
pub use state_store::{StateStore, StateStoreFactory};

use crate::Result;

/// Region the certificate authority is always addressed in
///
/// Certificates attached to a distribution must live in this region no
/// matter where the bucket is.
pub const CERTIFICATE_REGION: &str = "us-east-1";

/// The four resource clients of one run
///
/// Cheap to clone; provisioners borrow the client they need.
#[derive(Clone)]
pub struct ResourceClients {
    pub storage: Arc<dyn ObjectStorage>,
    pub cdn: Arc<dyn Cdn>,
    pub dns: Arc<dyn Dns>,
    pub certificates: Arc<dyn CertificateAuthority>,
}

impl std::fmt::Debug for ResourceClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceClients").finish_non_exhaustive()
    }
}

/// Helper trait for constructing the resource clients of a backend
pub trait ResourceClientsFactory: Send + Sync {
    /// Create clients for `region`
    ///
    /// # Parameters
    ///
    /// - `credentials`: Credentials acquired for this run
    /// - `region`: Region of the bucket. The certificate client must be
    ///   bound to [`CERTIFICATE_REGION`] instead.
    fn create(&self, credentials: &Credentials, region: &str) -> Result<ResourceClients>;
}
