//! Configuration types for the site reconciler
//!
//! Three layers of configuration live here:
//!
//! - [`SiteConfig`]: what the user asked for (domain, content path, bucket...)
//! - [`ExecutionRequest`]: one dispatcher invocation (action + instance + config)
//! - [`EngineConfig`]: delays, attempt budgets and timeouts of the reconciler

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// User-supplied site configuration
///
/// Every field is optional; the resolver fills the gaps from persisted
/// state and defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    /// Custom domain, with or without a leading scheme
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Content directory, relative to the workspace root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    /// Cloud-specific settings
    #[serde(default)]
    pub aws: AwsSiteConfig,
}

impl SiteConfig {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the custom domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the content directory
    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.aws.region = Some(region.into());
        self
    }

    /// Set an explicit bucket name
    pub fn with_bucket_name(mut self, bucket: impl Into<String>) -> Self {
        self.aws.s3_bucket_name = Some(bucket.into());
        self
    }
}

/// Cloud-specific part of [`SiteConfig`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSiteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_bucket_name: Option<String>,

    /// Index document name (default `index.html`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_index_file: Option<String>,

    /// Error document name (default `index.html`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_error_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudfront_distribution_description: Option<String>,
}

/// Action routed by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Deploy or update the site
    Run,
    /// Report outputs from persisted state
    Info,
    /// Tear the deployment down
    Remove,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ActionField {
    One(Action),
    Many(Vec<Action>),
}

fn deserialize_action<'de, D>(deserializer: D) -> Result<Action, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match ActionField::deserialize(deserializer)? {
        ActionField::One(action) => Ok(action),
        ActionField::Many(actions) => actions
            .into_iter()
            .next()
            .ok_or_else(|| serde::de::Error::custom("action list is empty")),
    }
}

/// One dispatcher invocation
///
/// ```json
/// { "action": ["run"], "instanceName": "marketing", "config": { "domain": "example.com" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Action to run; a plain string or a one-element list
    #[serde(deserialize_with = "deserialize_action")]
    pub action: Action,

    /// Name of the deployment instance
    pub instance_name: String,

    /// User configuration
    #[serde(default)]
    pub config: SiteConfig,
}

impl ExecutionRequest {
    /// Parse a request from its JSON payload
    pub fn from_json(payload: &str) -> Result<Self, crate::Error> {
        let request: Self = serde_json::from_str(payload)
            .map_err(|e| crate::Error::config(format!("Invalid execution request: {}", e)))?;
        if request.instance_name.trim().is_empty() {
            return Err(crate::Error::config("instanceName cannot be empty"));
        }
        Ok(request)
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

impl StateStoreConfig {
    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
        }
    }
}

/// Reconciler settings
///
/// Every pause, polling budget and timeout the reconciler uses. Defaults
/// match what the cloud provider needs in practice; tests zero the delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root that content paths are resolved against
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Delay between bucket existence checks after creation (ms)
    #[serde(default = "default_bucket_poll_delay_ms")]
    pub bucket_poll_delay_ms: u64,

    /// Maximum bucket existence checks after creation
    #[serde(default = "default_bucket_poll_attempts")]
    pub bucket_poll_attempts: usize,

    /// Delay before retrying hosting configuration on a missing bucket (ms)
    #[serde(default = "default_hosting_retry_delay_ms")]
    pub hosting_retry_delay_ms: u64,

    /// Total hosting configuration attempts
    #[serde(default = "default_hosting_attempts")]
    pub hosting_attempts: usize,

    /// Pause after requesting a certificate so validation metadata appears (ms)
    #[serde(default = "default_certificate_settle_delay_ms")]
    pub certificate_settle_delay_ms: u64,

    /// Delay between certificate status checks (ms)
    #[serde(default = "default_certificate_poll_delay_ms")]
    pub certificate_poll_delay_ms: u64,

    /// Maximum certificate status checks per run
    #[serde(default = "default_certificate_poll_attempts")]
    pub certificate_poll_attempts: usize,

    /// Base delay of the viewer-certificate backoff (ms)
    #[serde(default = "default_viewer_certificate_backoff_ms")]
    pub viewer_certificate_backoff_ms: u64,

    /// Upper bound of a single viewer-certificate backoff step (ms)
    #[serde(default = "default_viewer_certificate_backoff_cap_ms")]
    pub viewer_certificate_backoff_cap_ms: u64,

    /// Total distribution update attempts when the certificate is rejected
    #[serde(default = "default_viewer_certificate_attempts")]
    pub viewer_certificate_attempts: usize,

    /// Delay between distribution status checks during teardown (ms)
    #[serde(default = "default_distribution_poll_delay_ms")]
    pub distribution_poll_delay_ms: u64,

    /// Upper bound on waiting for a disabled distribution (seconds)
    ///
    /// `None` waits for as long as the provider takes.
    #[serde(default = "default_distribution_disable_timeout_secs")]
    pub distribution_disable_timeout_secs: Option<u64>,

    /// Maximum concurrent object uploads during a content sync
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    /// Capacity of the engine event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the workspace root
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.bucket_poll_attempts == 0 {
            return Err(crate::Error::config("bucket_poll_attempts must be > 0"));
        }
        if self.hosting_attempts == 0 {
            return Err(crate::Error::config("hosting_attempts must be > 0"));
        }
        if self.viewer_certificate_attempts == 0 {
            return Err(crate::Error::config(
                "viewer_certificate_attempts must be > 0",
            ));
        }
        if self.upload_concurrency == 0 {
            return Err(crate::Error::config("upload_concurrency must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        if self.distribution_disable_timeout_secs == Some(0) {
            return Err(crate::Error::config(
                "distribution_disable_timeout_secs must be > 0 when set",
            ));
        }
        Ok(())
    }

    pub fn bucket_poll_delay(&self) -> Duration {
        Duration::from_millis(self.bucket_poll_delay_ms)
    }

    pub fn hosting_retry_delay(&self) -> Duration {
        Duration::from_millis(self.hosting_retry_delay_ms)
    }

    pub fn certificate_settle_delay(&self) -> Duration {
        Duration::from_millis(self.certificate_settle_delay_ms)
    }

    pub fn certificate_poll_delay(&self) -> Duration {
        Duration::from_millis(self.certificate_poll_delay_ms)
    }

    pub fn viewer_certificate_backoff(&self) -> Duration {
        Duration::from_millis(self.viewer_certificate_backoff_ms)
    }

    pub fn viewer_certificate_backoff_cap(&self) -> Duration {
        Duration::from_millis(self.viewer_certificate_backoff_cap_ms)
    }

    pub fn distribution_poll_delay(&self) -> Duration {
        Duration::from_millis(self.distribution_poll_delay_ms)
    }

    pub fn distribution_disable_timeout(&self) -> Option<Duration> {
        self.distribution_disable_timeout_secs
            .map(Duration::from_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            bucket_poll_delay_ms: default_bucket_poll_delay_ms(),
            bucket_poll_attempts: default_bucket_poll_attempts(),
            hosting_retry_delay_ms: default_hosting_retry_delay_ms(),
            hosting_attempts: default_hosting_attempts(),
            certificate_settle_delay_ms: default_certificate_settle_delay_ms(),
            certificate_poll_delay_ms: default_certificate_poll_delay_ms(),
            certificate_poll_attempts: default_certificate_poll_attempts(),
            viewer_certificate_backoff_ms: default_viewer_certificate_backoff_ms(),
            viewer_certificate_backoff_cap_ms: default_viewer_certificate_backoff_cap_ms(),
            viewer_certificate_attempts: default_viewer_certificate_attempts(),
            distribution_poll_delay_ms: default_distribution_poll_delay_ms(),
            distribution_disable_timeout_secs: default_distribution_disable_timeout_secs(),
            upload_concurrency: default_upload_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("/workspace")
}

fn default_bucket_poll_delay_ms() -> u64 {
    2_000
}

fn default_bucket_poll_attempts() -> usize {
    30
}

fn default_hosting_retry_delay_ms() -> u64 {
    2_000
}

fn default_hosting_attempts() -> usize {
    2
}

fn default_certificate_settle_delay_ms() -> u64 {
    10_000
}

fn default_certificate_poll_delay_ms() -> u64 {
    25_000
}

fn default_certificate_poll_attempts() -> usize {
    10
}

fn default_viewer_certificate_backoff_ms() -> u64 {
    1_000
}

fn default_viewer_certificate_backoff_cap_ms() -> u64 {
    30_000
}

fn default_viewer_certificate_attempts() -> usize {
    3
}

fn default_distribution_poll_delay_ms() -> u64 {
    30_000
}

fn default_distribution_disable_timeout_secs() -> Option<u64> {
    Some(45 * 60)
}

fn default_upload_concurrency() -> usize {
    16
}

fn default_event_channel_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_action_list() {
        let request = ExecutionRequest::from_json(
            r#"{"action":["remove"],"instanceName":"blog","config":{}}"#,
        )
        .unwrap();
        assert_eq!(request.action, Action::Remove);
        assert_eq!(request.instance_name, "blog");
    }

    #[test]
    fn test_request_parses_site_config() {
        let request = ExecutionRequest::from_json(
            r#"{
                "action": "run",
                "instanceName": "blog",
                "config": {
                    "domain": "https://example.com",
                    "src": "dist",
                    "aws": { "region": "eu-west-1", "s3BucketName": "my-bucket" }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(request.action, Action::Run);
        assert_eq!(request.config.domain.as_deref(), Some("https://example.com"));
        assert_eq!(request.config.src.as_deref(), Some("dist"));
        assert_eq!(request.config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(request.config.aws.s3_bucket_name.as_deref(), Some("my-bucket"));
    }

    #[test]
    fn test_request_rejects_unknown_action_and_empty_instance() {
        assert!(ExecutionRequest::from_json(r#"{"action":"deploy","instanceName":"x"}"#).is_err());
        assert!(ExecutionRequest::from_json(r#"{"action":[],"instanceName":"x"}"#).is_err());
        assert!(ExecutionRequest::from_json(r#"{"action":"run","instanceName":" "}"#).is_err());
    }

    #[test]
    fn test_engine_config_defaults_and_validation() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.certificate_poll_attempts, 10);
        assert_eq!(config.distribution_disable_timeout(), Some(Duration::from_secs(2700)));

        let parsed: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.bucket_poll_attempts, config.bucket_poll_attempts);

        let mut bad = EngineConfig::default();
        bad.upload_concurrency = 0;
        assert!(bad.validate().is_err());
    }
}
