// # CDN Trait
//
// Capability interface for the distribution that fronts the bucket.
//
// Distribution configs are exchanged as a whole: read with a concurrency
// token (`etag`), modified locally, written back with that token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// How the CDN talks to the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OriginProtocolPolicy {
    HttpOnly,
    MatchViewer,
    HttpsOnly,
}

/// How viewers are allowed to connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewerProtocolPolicy {
    AllowAll,
    RedirectToHttps,
    HttpsOnly,
}

/// Custom (non bucket-API) origin settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomOriginConfig {
    pub http_port: u16,
    pub https_port: u16,
    pub protocol_policy: OriginProtocolPolicy,
    pub ssl_protocols: Vec<String>,
    pub read_timeout_secs: u32,
    pub keepalive_timeout_secs: u32,
}

/// A single origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Origin id referenced by cache behaviors
    pub id: String,
    /// Host name the CDN fetches from
    pub domain_name: String,
    pub custom_origin: CustomOriginConfig,
    pub connection_attempts: u32,
    pub connection_timeout_secs: u32,
}

/// Default cache behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBehavior {
    pub target_origin_id: String,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub forward_query_string: bool,
    pub min_ttl: u64,
    pub default_ttl: u64,
    pub max_ttl: u64,
    pub compress: bool,
}

/// Rewrite of an origin error status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomErrorResponse {
    pub error_code: u16,
    pub response_code: u16,
    pub response_page_path: String,
    /// Negative-cache TTL in seconds
    pub error_caching_min_ttl: u64,
}

/// TLS certificate served to viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewerCertificate {
    /// The provider's default certificate (provider-assigned domain only)
    Default,
    /// A certificate from the certificate authority
    Acm {
        certificate_arn: String,
        ssl_support_method: String,
        minimum_protocol_version: String,
    },
}

impl ViewerCertificate {
    /// Certificate identifier, if a custom certificate is attached
    pub fn certificate_arn(&self) -> Option<&str> {
        match self {
            ViewerCertificate::Default => None,
            ViewerCertificate::Acm {
                certificate_arn, ..
            } => Some(certificate_arn),
        }
    }
}

/// Full distribution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Unique token making creation idempotent
    pub caller_reference: String,
    pub comment: String,
    pub default_root_object: String,
    pub enabled: bool,
    /// Alternate domain names
    pub aliases: Vec<String>,
    pub origins: Vec<Origin>,
    pub default_cache_behavior: CacheBehavior,
    pub custom_error_responses: Vec<CustomErrorResponse>,
    pub viewer_certificate: ViewerCertificate,
    pub price_class: String,
    pub http_version: String,
}

/// Deployment status reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionStatus {
    /// Changes are still propagating
    InProgress,
    /// All edge locations run the current config
    Deployed,
}

/// A distribution as returned by create/get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub id: String,
    pub arn: String,
    /// Provider-assigned domain name (e.g. `d111111abcdef8.cloudfront.net`)
    pub domain_name: String,
    pub status: DistributionStatus,
    pub config: DistributionConfig,
}

/// A config together with its concurrency token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedDistributionConfig {
    pub config: DistributionConfig,
    pub etag: String,
}

/// Cache invalidation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationBatch {
    pub caller_reference: String,
    pub paths: Vec<String>,
}

/// Trait for CDN implementations
///
/// # Error codes
///
/// - `NoSuchDistribution` when the id is unknown
/// - `PreconditionFailed` when `if_match` is stale
/// - `InvalidViewerCertificate` when the certificate cannot be attached yet
/// - `DistributionNotDisabled` when deleting an enabled or undeployed distribution
#[async_trait]
pub trait Cdn: Send + Sync {
    /// Create a distribution
    async fn create(&self, config: &DistributionConfig) -> Result<Distribution>;

    /// Fetch a distribution with its status
    async fn get(&self, id: &str) -> Result<Distribution>;

    /// Fetch a distribution config and its concurrency token
    async fn get_config(&self, id: &str) -> Result<TaggedDistributionConfig>;

    /// Replace a distribution config, returning the new token
    async fn update(&self, id: &str, config: &DistributionConfig, if_match: &str)
    -> Result<String>;

    /// Delete a disabled, deployed distribution
    async fn delete(&self, id: &str, if_match: &str) -> Result<()>;

    /// Request a cache invalidation, returning its id
    async fn invalidate(&self, id: &str, batch: &InvalidationBatch) -> Result<String>;
}
