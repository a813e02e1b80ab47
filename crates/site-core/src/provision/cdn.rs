//! CDN distribution management

use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, ErrorCode};
use crate::retry::{RetryPolicy, retry};
use crate::traits::cdn::{
    CacheBehavior, Cdn, CustomErrorResponse, CustomOriginConfig, Distribution,
    DistributionConfig, DistributionStatus, InvalidationBatch, Origin, OriginProtocolPolicy,
    ViewerCertificate, ViewerProtocolPolicy,
};
use crate::Result;

/// One year, the longest an object may stay cached
const MAX_TTL_SECS: u64 = 31_536_000;

/// Negative-cache TTL of rewritten 403/404 responses
const ERROR_CACHING_MIN_TTL_SECS: u64 = 300;

const SSL_SUPPORT_METHOD: &str = "sni-only";
const MINIMUM_PROTOCOL_VERSION: &str = "TLSv1.1_2016";

/// What [`ensure_configured`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// Nothing differed, no update was sent
    Unchanged,
    /// One update call was accepted
    Updated,
}

/// What [`disable_and_delete`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionRemoval {
    Deleted,
    AlreadyAbsent,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Configuration of a new distribution fronting a bucket website endpoint
pub fn site_distribution_config(
    description: &str,
    bucket: &str,
    website_url: &str,
    index_document: &str,
) -> DistributionConfig {
    let error_page = format!("/{}", index_document.trim_start_matches('/'));
    let rewrite = |error_code| CustomErrorResponse {
        error_code,
        response_code: 200,
        response_page_path: error_page.clone(),
        error_caching_min_ttl: ERROR_CACHING_MIN_TTL_SECS,
    };

    DistributionConfig {
        caller_reference: Utc::now().timestamp_millis().to_string(),
        comment: description.to_string(),
        default_root_object: index_document.to_string(),
        enabled: true,
        aliases: Vec::new(),
        origins: vec![Origin {
            id: bucket.to_string(),
            domain_name: website_url.to_string(),
            custom_origin: CustomOriginConfig {
                http_port: 80,
                https_port: 443,
                protocol_policy: OriginProtocolPolicy::HttpOnly,
                ssl_protocols: strings(&["TLSv1.2"]),
                read_timeout_secs: 30,
                keepalive_timeout_secs: 5,
            },
            connection_attempts: 3,
            connection_timeout_secs: 10,
        }],
        default_cache_behavior: CacheBehavior {
            target_origin_id: bucket.to_string(),
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            allowed_methods: strings(&["HEAD", "GET"]),
            cached_methods: strings(&["HEAD", "GET"]),
            forward_query_string: false,
            min_ttl: 0,
            default_ttl: 0,
            max_ttl: MAX_TTL_SECS,
            compress: false,
        },
        custom_error_responses: vec![rewrite(404), rewrite(403)],
        viewer_certificate: ViewerCertificate::Default,
        price_class: "PriceClass_All".to_string(),
        http_version: "http2".to_string(),
    }
}

/// Create a distribution fronting `website_url`
pub async fn create_distribution(
    cdn: &dyn Cdn,
    description: &str,
    bucket: &str,
    website_url: &str,
    index_document: &str,
) -> Result<Distribution> {
    let config = site_distribution_config(description, bucket, website_url, index_document);
    let distribution = cdn.create(&config).await?;
    info!(
        "Created distribution {} ({})",
        distribution.id, distribution.domain_name
    );
    Ok(distribution)
}

/// Fail with drift when a recorded distribution no longer exists
pub async fn ensure_present(cdn: &dyn Cdn, distribution_id: &str) -> Result<Distribution> {
    match cdn.get(distribution_id).await {
        Ok(distribution) => Ok(distribution),
        Err(e) if e.is_code(&ErrorCode::NoSuchDistribution) => {
            Err(Error::drift("distribution", distribution_id))
        }
        Err(e) => Err(e),
    }
}

/// Keep the distribution enabled with the domain alias and certificate attached
///
/// All needed changes go out in one update. A rejected certificate is retried
/// with exponential backoff; once the budget is spent the result is
/// [`Error::CertificateNotYetValid`].
pub async fn ensure_configured(
    cdn: &dyn Cdn,
    distribution_id: &str,
    domain: Option<&str>,
    certificate_arn: Option<&str>,
    config: &EngineConfig,
) -> Result<ConfigureOutcome> {
    let tagged = match cdn.get_config(distribution_id).await {
        Ok(tagged) => tagged,
        Err(e) if e.is_code(&ErrorCode::NoSuchDistribution) => {
            return Err(Error::drift("distribution", distribution_id));
        }
        Err(e) => return Err(e),
    };

    let mut desired = tagged.config.clone();
    desired.enabled = true;
    if let Some(domain) = domain {
        if !desired
            .aliases
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(domain))
        {
            desired.aliases.push(domain.to_string());
        }
    }
    if let Some(arn) = certificate_arn {
        if desired.viewer_certificate.certificate_arn() != Some(arn) {
            desired.viewer_certificate = ViewerCertificate::Acm {
                certificate_arn: arn.to_string(),
                ssl_support_method: SSL_SUPPORT_METHOD.to_string(),
                minimum_protocol_version: MINIMUM_PROTOCOL_VERSION.to_string(),
            };
        }
    }

    if desired == tagged.config {
        debug!("Distribution {} already configured", distribution_id);
        return Ok(ConfigureOutcome::Unchanged);
    }

    let policy = RetryPolicy::exponential(
        config.viewer_certificate_attempts,
        config.viewer_certificate_backoff(),
        config.viewer_certificate_backoff_cap(),
    );
    let result = retry(
        &policy,
        "distribution update",
        |e| e.is_code(&ErrorCode::InvalidViewerCertificate),
        || cdn.update(distribution_id, &desired, &tagged.etag),
    )
    .await;

    match result {
        Ok(_) => {
            info!("Updated distribution {}", distribution_id);
            Ok(ConfigureOutcome::Updated)
        }
        Err(e) if e.is_code(&ErrorCode::InvalidViewerCertificate) => {
            Err(Error::CertificateNotYetValid {
                distribution_id: distribution_id.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

/// Invalidate every cached path
///
/// Returns once the invalidation is accepted, not once it has completed.
pub async fn invalidate(cdn: &dyn Cdn, distribution_id: &str) -> Result<String> {
    let batch = InvalidationBatch {
        caller_reference: format!("invalidate-{}", Utc::now().timestamp_millis()),
        paths: vec!["/*".to_string()],
    };
    let invalidation_id = cdn.invalidate(distribution_id, &batch).await?;
    debug!(
        "Invalidation {} accepted for distribution {}",
        invalidation_id, distribution_id
    );
    Ok(invalidation_id)
}

/// Disable a distribution, wait for it to settle, then delete it
///
/// The wait is bounded by `distribution_disable_timeout`. A distribution that
/// is already gone counts as removed.
pub async fn disable_and_delete(
    cdn: &dyn Cdn,
    distribution_id: &str,
    config: &EngineConfig,
) -> Result<DistributionRemoval> {
    match disable_wait_delete(cdn, distribution_id, config).await {
        Ok(()) => {
            info!("Deleted distribution {}", distribution_id);
            Ok(DistributionRemoval::Deleted)
        }
        Err(e) if e.is_code(&ErrorCode::NoSuchDistribution) => {
            debug!("Distribution {} already absent", distribution_id);
            Ok(DistributionRemoval::AlreadyAbsent)
        }
        Err(e) => Err(e),
    }
}

async fn disable_wait_delete(
    cdn: &dyn Cdn,
    distribution_id: &str,
    config: &EngineConfig,
) -> Result<()> {
    let tagged = cdn.get_config(distribution_id).await?;
    if tagged.config.enabled {
        let mut disabled = tagged.config.clone();
        disabled.enabled = false;
        cdn.update(distribution_id, &disabled, &tagged.etag).await?;
        info!("Disabled distribution {}", distribution_id);
    }

    let started = Instant::now();
    let wait = wait_until_disabled(cdn, distribution_id, config);
    match config.distribution_disable_timeout() {
        Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
            warn!(
                "Distribution {} did not finish disabling within {:?}",
                distribution_id, limit
            );
            Error::Timeout {
                operation: format!("distribution {} to be disabled", distribution_id),
                waited: started.elapsed(),
            }
        })??,
        None => wait.await?,
    }

    // The disable changed the concurrency token
    let fresh = cdn.get_config(distribution_id).await?;
    cdn.delete(distribution_id, &fresh.etag).await
}

async fn wait_until_disabled(cdn: &dyn Cdn, distribution_id: &str, config: &EngineConfig) -> Result<()> {
    loop {
        tokio::time::sleep(config.distribution_poll_delay()).await;
        let distribution = cdn.get(distribution_id).await?;
        if distribution.status == DistributionStatus::Deployed && !distribution.config.enabled {
            return Ok(());
        }
        debug!(
            "Distribution {} is {:?}, waiting",
            distribution_id, distribution.status
        );
    }
}
