//! Error types for the site reconciler
//!
//! This module defines all error types used throughout the crate.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for reconciler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Guidance shown when a distribution refuses a certificate that has not
/// finished validation.
const CERTIFICATE_PROPAGATION_GUIDANCE: &str = "The TLS certificate is not yet valid for this \
distribution. If the domain is served by an external DNS provider, point it at the hosted zone \
name servers listed in the outputs and wait for DNS propagation (this can take a few hours). \
Once the certificate has been issued, run the deployment again.";

/// Cloud service a provider call was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Object storage (buckets, objects, website hosting)
    ObjectStorage,
    /// Content delivery network
    Cdn,
    /// DNS hosted zones and record sets
    Dns,
    /// Certificate authority
    CertificateAuthority,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Service::ObjectStorage => "object-storage",
            Service::Cdn => "cdn",
            Service::Dns => "dns",
            Service::CertificateAuthority => "certificate-authority",
        };
        f.write_str(name)
    }
}

/// Provider error codes the reconciler reacts to
///
/// Anything the reconciler does not branch on is carried as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Generic "not found" (e.g. a head request on a missing bucket)
    NotFound,
    NoSuchBucket,
    NoSuchWebsiteConfiguration,
    NoSuchDistribution,
    NoSuchHostedZone,
    NoSuchCertificate,
    /// Record change rejected, typically because the record is already gone
    InvalidChangeBatch,
    /// The distribution rejected the certificate (not yet issued)
    InvalidViewerCertificate,
    Forbidden,
    /// Stale concurrency token
    PreconditionFailed,
    DistributionNotDisabled,
    BucketAlreadyExists,
    /// Any other provider code
    Other(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Other(code) => f.write_str(code),
            code => write!(f, "{:?}", code),
        }
    }
}

/// A failed call against one of the resource APIs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{service} error ({code}): {message}")]
pub struct ApiError {
    /// Service that produced the error
    pub service: Service,
    /// Provider error code
    pub code: ErrorCode,
    /// Provider message
    pub message: String,
}

impl ApiError {
    /// Create a new API error
    pub fn new(service: Service, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            service,
            code,
            message: message.into(),
        }
    }
}

/// Core error type for the site reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration change that cannot be applied in place
    #[error(
        "Changing the {field} from {from} to {to} is not allowed because it is a breaking change. \
         Remove this deployment and deploy again with the new {field}."
    )]
    BreakingChange {
        /// Immutable field the change targeted
        field: &'static str,
        /// Persisted value
        from: String,
        /// Requested value
        to: String,
    },

    /// The configured domain is malformed
    #[error("Domain validation error for \"{domain}\": {reason}")]
    InvalidDomain {
        /// Domain as supplied
        domain: String,
        /// Why it was rejected
        reason: String,
    },

    /// The configured content path does not exist
    #[error(
        "The \"src\" path \"{path}\" does not exist or is not a directory. \
         Check the configuration and your directory structure."
    )]
    MissingPath {
        /// Path as supplied, relative to the workspace root
        path: String,
    },

    /// Credentials could not be obtained
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// A resource API call failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A persisted identifier references a resource that no longer exists
    #[error(
        "Drift detected: {resource} \"{id}\" is recorded in state but no longer exists. \
         Restore it or remove the deployment before deploying again."
    )]
    Drift {
        /// Kind of resource
        resource: &'static str,
        /// Persisted identifier
        id: String,
    },

    /// The bucket name belongs to someone else (or credentials are invalid)
    #[error("Bucket name \"{bucket}\" is already taken or the credentials are not allowed to use it")]
    BucketNameTaken {
        /// Requested bucket name
        bucket: String,
    },

    /// Viewer certificate retries were exhausted
    #[error("Distribution {distribution_id} rejected the certificate. {guidance}", guidance = CERTIFICATE_PROPAGATION_GUIDANCE)]
    CertificateNotYetValid {
        /// Distribution being reconfigured
        distribution_id: String,
    },

    /// A bounded wait ran out
    #[error("Timed out after {waited:?} waiting for {operation}")]
    Timeout {
        /// What was being waited for
        operation: String,
        /// How long the reconciler waited
        waited: Duration,
    },

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a credentials error
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create a resource API error
    pub fn api(service: Service, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Api(ApiError::new(service, code, message))
    }

    /// Create a drift error
    pub fn drift(resource: &'static str, id: impl Into<String>) -> Self {
        Self::Drift {
            resource,
            id: id.into(),
        }
    }

    /// Provider error code, if this is a resource API error
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            Error::Api(api) => Some(&api.code),
            _ => None,
        }
    }

    /// Whether this is a resource API error with the given code
    pub fn is_code(&self, code: &ErrorCode) -> bool {
        self.code() == Some(code)
    }

    /// Whether this error belongs to the validation class
    ///
    /// Validation errors are raised before any resource call is made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::BreakingChange { .. } | Error::InvalidDomain { .. } | Error::MissingPath { .. }
        )
    }
}
