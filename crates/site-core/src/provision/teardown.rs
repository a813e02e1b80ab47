//! Teardown in reverse dependency order
//!
//! 1. Certificate validation record (the certificate itself is kept)
//! 2. Alias record pointing at the distribution
//! 3. Distribution (disable, wait, delete)
//! 4. Bucket (empty, delete)
//!
//! Each step forgets its identifiers once done, so an interrupted teardown
//! resumes where it stopped. The document is cleared only after every step
//! succeeded. Resources that are already gone count as removed.

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::ErrorCode;
use crate::provision::{cdn, dns, storage};
use crate::state::StateLedger;
use crate::traits::ResourceClients;
use crate::Result;

/// What a teardown removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownSummary {
    /// Certificate left in place for the operator to delete
    pub retained_certificate: Option<String>,
    pub validation_record_removed: bool,
    pub alias_record_removed: bool,
    pub distribution_removed: bool,
    pub bucket_removed: bool,
}

/// Remove every resource referenced by the ledger, then clear it
pub async fn teardown(
    clients: &ResourceClients,
    ledger: &mut StateLedger<'_>,
    config: &EngineConfig,
) -> Result<TeardownSummary> {
    let mut summary = TeardownSummary::default();
    let state = ledger.get().clone();
    let zone_id = state.aws.route53_hosted_zone_id.clone();

    if let Some(arn) = state.aws.acm_certificate_arn.as_deref() {
        match clients.certificates.describe(arn).await {
            Ok(detail) => {
                if let (Some(record), Some(zone_id)) =
                    (detail.cname_validation_record(), zone_id.as_deref())
                {
                    summary.validation_record_removed =
                        dns::remove_validation_record(clients.dns.as_ref(), zone_id, record)
                            .await?;
                }
            }
            Err(e) if e.is_code(&ErrorCode::NoSuchCertificate) => {
                debug!("Certificate {} already absent", arn);
            }
            Err(e) => return Err(e),
        }
        info!(
            "The certificate {} was not deleted. Delete it manually if it is no longer needed.",
            arn
        );
        summary.retained_certificate = Some(arn.to_string());
        ledger.update(|s| s.aws.acm_certificate_arn = None).await?;
    }

    if let (Some(zone_id), Some(domain), Some(cdn_url)) = (
        zone_id.as_deref(),
        state.domain.as_deref(),
        state.aws.cloudfront_distribution_url.as_deref(),
    ) {
        summary.alias_record_removed =
            dns::remove_alias_record(clients.dns.as_ref(), zone_id, domain, cdn_url).await?;
    }

    if let Some(distribution_id) = state.aws.cloudfront_distribution_id.as_deref() {
        let removal =
            cdn::disable_and_delete(clients.cdn.as_ref(), distribution_id, config).await?;
        summary.distribution_removed = removal == cdn::DistributionRemoval::Deleted;
        ledger
            .update(|s| {
                s.aws.cloudfront_distribution_id = None;
                s.aws.cloudfront_distribution_arn = None;
                s.aws.cloudfront_distribution_url = None;
            })
            .await?;
    }

    if let Some(bucket) = state.aws.s3_bucket_name.as_deref() {
        let removal = storage::empty_and_delete_bucket(clients.storage.as_ref(), bucket).await?;
        summary.bucket_removed = matches!(removal, storage::BucketRemoval::Deleted { .. });
        ledger
            .update(|s| {
                s.aws.s3_bucket_name = None;
                s.aws.s3_bucket_configured_for_hosting = None;
                s.aws.s3_bucket_website_url = None;
            })
            .await?;
    }

    ledger.clear().await?;
    info!("Deployment removed");
    Ok(summary)
}
