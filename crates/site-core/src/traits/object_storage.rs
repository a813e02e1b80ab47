// # Object Storage Trait
//
// Capability interface for the bucket that hosts the site content.
//
// Every call is a single round-trip to the provider. Waiting, retrying and
// "already exists" decisions are owned by the provisioners in `provision`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Website hosting rules of a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteConfiguration {
    /// Document served for directory requests (e.g. `index.html`)
    pub index_document: String,
    /// Document served on errors
    pub error_document: String,
}

/// Public access block flags
///
/// All `false` means public policies and ACLs are honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

/// One CORS rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsRule {
    pub allowed_methods: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age_seconds: u32,
}

/// Upload of a single object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    pub bucket: String,
    /// Object key, always `/`-separated
    pub key: String,
    pub body: Vec<u8>,
    /// MIME type served with the object
    pub content_type: String,
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Keys on this page
    pub keys: Vec<String>,
    /// Token for the next page, `None` on the last page
    pub next_token: Option<String>,
}

/// Trait for object storage implementations
///
/// # Error codes
///
/// - `head_bucket`: `NotFound` when the bucket does not exist (yet),
///   `Forbidden` when it belongs to someone else
/// - `get_website_config`: `NoSuchWebsiteConfiguration` when hosting is off
/// - everything else: `NoSuchBucket` when the bucket is missing
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Check that a bucket exists and is accessible
    async fn head_bucket(&self, bucket: &str) -> Result<()>;

    /// Create a bucket
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Read the website configuration
    async fn get_website_config(&self, bucket: &str) -> Result<WebsiteConfiguration>;

    /// Replace the website configuration
    async fn put_website_config(&self, bucket: &str, config: &WebsiteConfiguration)
    -> Result<()>;

    /// Replace the bucket policy (JSON document)
    async fn put_policy(&self, bucket: &str, policy: &str) -> Result<()>;

    /// Replace the CORS rules
    async fn put_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()>;

    /// Replace the public access block
    async fn put_public_access_block(&self, bucket: &str, block: &PublicAccessBlock)
    -> Result<()>;

    /// List one page of object keys
    async fn list_objects(&self, bucket: &str, continuation: Option<&str>)
    -> Result<ObjectListing>;

    /// Upload one object
    async fn put_object(&self, request: PutObjectRequest) -> Result<()>;

    /// Delete a batch of objects (at most 1000 keys)
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;

    /// Delete an empty bucket
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;
}
