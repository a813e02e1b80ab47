// # Deployment State
//
// The persisted document describing what a deployment has provisioned so far,
// plus the StateStore implementations that keep it.
//
// ## Document Format
//
// ```json
// {
//   "domain": "example.com",
//   "aws": {
//     "region": "us-east-1",
//     "s3BucketName": "website-blog-1a2b3c4d",
//     "s3BucketConfiguredForHosting": true,
//     "cloudfrontDistributionId": "E2QWRUHAPOMQZL"
//   }
// }
// ```
//
// Keys written by sibling features are carried through untouched.

pub mod file;
pub mod ledger;
pub mod memory;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use ledger::StateLedger;
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persisted deployment document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Normalized custom domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Cloud resources provisioned so far
    #[serde(default, skip_serializing_if = "AwsState::is_empty")]
    pub aws: AwsState,

    /// Keys this crate does not own
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeploymentState {
    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.domain.is_none() && self.aws.is_empty() && self.extra.is_empty()
    }
}

/// Cloud part of [`DeploymentState`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_bucket_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_bucket_configured_for_hosting: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_bucket_website_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudfront_distribution_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudfront_distribution_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudfront_distribution_url: Option<String>,

    /// Zone id without the `/hostedzone/` prefix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route53_hosted_zone_id: Option<String>,

    /// Whether this deployment created the zone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route53_hosted_zone_created_by_extension: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route53_hosted_zone_nameservers: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acm_certificate_arn: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AwsState {
    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.s3_bucket_name.is_none()
            && self.s3_bucket_configured_for_hosting.is_none()
            && self.s3_bucket_website_url.is_none()
            && self.cloudfront_distribution_id.is_none()
            && self.cloudfront_distribution_arn.is_none()
            && self.cloudfront_distribution_url.is_none()
            && self.route53_hosted_zone_id.is_none()
            && self.route53_hosted_zone_created_by_extension.is_none()
            && self.route53_hosted_zone_nameservers.is_none()
            && self.acm_certificate_arn.is_none()
            && self.extra.is_empty()
    }

    /// Whether the bucket has been configured for website hosting
    pub fn hosting_configured(&self) -> bool {
        self.s3_bucket_configured_for_hosting.unwrap_or(false)
    }
}
