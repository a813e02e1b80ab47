//! Certificate provisioning
//!
//! Finds or requests a DNS-validated certificate for the site domain and
//! drives validation by publishing the validation record in the hosted zone.

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, ErrorCode};
use crate::provision::dns;
use crate::traits::certificate::{
    CertificateAuthority, CertificateRequest, CertificateStatus, ValidationMethod,
};
use crate::traits::dns::Dns;
use crate::Result;

/// Result of [`find_or_create_certificate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateOutcome {
    pub arn: String,
    /// Whether the certificate was requested during this call
    pub created: bool,
    /// Last status observed while polling
    pub status: CertificateStatus,
}

/// Ensure a certificate covering `domain` exists and drive its validation
///
/// # Parameters
///
/// - `recorded_arn`: Certificate identifier from state. It must still exist,
///   otherwise this is drift.
/// - `zone_id`: Hosted zone that receives the validation record
///
/// A certificate that is still pending after the polling budget is not an
/// error; the next deploy picks validation up again.
pub async fn find_or_create_certificate(
    certificates: &dyn CertificateAuthority,
    dns: &dyn Dns,
    domain: &str,
    zone_id: &str,
    recorded_arn: Option<&str>,
    config: &EngineConfig,
) -> Result<CertificateOutcome> {
    let (arn, created) = match recorded_arn {
        Some(arn) => {
            ensure_present(certificates, arn).await?;
            (arn.to_string(), false)
        }
        None => find_or_request(certificates, domain, config).await?,
    };

    let status = await_validation(certificates, dns, &arn, zone_id, config).await?;
    Ok(CertificateOutcome {
        arn,
        created,
        status,
    })
}

/// Fail with drift when a recorded certificate no longer exists
pub async fn ensure_present(certificates: &dyn CertificateAuthority, arn: &str) -> Result<()> {
    match certificates.describe(arn).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_code(&ErrorCode::NoSuchCertificate) => Err(Error::drift("certificate", arn)),
        Err(e) => Err(e),
    }
}

async fn find_or_request(
    certificates: &dyn CertificateAuthority,
    domain: &str,
    config: &EngineConfig,
) -> Result<(String, bool)> {
    let existing = certificates.list().await?;
    if let Some(summary) = existing.iter().find(|summary| summary.covers(domain)) {
        debug!("Reusing certificate {} for {}", summary.arn, domain);
        return Ok((summary.arn.clone(), false));
    }

    let arn = certificates
        .request(&CertificateRequest {
            domain_name: domain.to_string(),
            validation_method: ValidationMethod::Dns,
            subject_alternative_names: vec![domain.to_string()],
        })
        .await?;
    info!("Requested certificate {} for {}", arn, domain);

    // Validation options are filled in asynchronously after the request
    tokio::time::sleep(config.certificate_settle_delay()).await;
    Ok((arn, true))
}

async fn await_validation(
    certificates: &dyn CertificateAuthority,
    dns_client: &dyn Dns,
    arn: &str,
    zone_id: &str,
    config: &EngineConfig,
) -> Result<CertificateStatus> {
    let mut record_written = false;
    let mut status = CertificateStatus::PendingValidation;

    for attempt in 1..=config.certificate_poll_attempts {
        let detail = certificates.describe(arn).await?;
        status = detail.status;

        if status != CertificateStatus::PendingValidation {
            debug!("Certificate {} left validation with status {:?}", arn, status);
            return Ok(status);
        }

        if !record_written {
            if let Some(record) = detail.first_validation_record() {
                dns::upsert_validation_record(dns_client, zone_id, record).await?;
                record_written = true;
            }
        }

        if attempt < config.certificate_poll_attempts {
            tokio::time::sleep(config.certificate_poll_delay()).await;
        }
    }

    warn!(
        "Certificate {} is still pending validation after {} checks; it will be checked again on the next deploy",
        arn, config.certificate_poll_attempts
    );
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{CertificateBehavior, MemoryCloud};

    fn fast_config() -> EngineConfig {
        EngineConfig {
            certificate_settle_delay_ms: 0,
            certificate_poll_delay_ms: 0,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_pending_certificate_is_bounded_and_not_an_error() {
        let cloud = MemoryCloud::new();
        cloud.set_certificate_behavior(CertificateBehavior::NeverValidates);
        let zone = cloud.seed_zone("example.com");

        let outcome =
            find_or_create_certificate(&cloud, &cloud, "example.com", &zone, None, &fast_config())
                .await
                .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.status, CertificateStatus::PendingValidation);
        assert_eq!(cloud.call_count("acm.describe"), 10);
        assert_eq!(cloud.call_count("route53.change_records"), 1);
    }

    #[tokio::test]
    async fn test_existing_certificate_is_reused() {
        let cloud = MemoryCloud::new();
        let zone = cloud.seed_zone("example.com");
        let arn = cloud.seed_issued_certificate("example.com");

        let outcome =
            find_or_create_certificate(&cloud, &cloud, "example.com", &zone, None, &fast_config())
                .await
                .unwrap();

        assert_eq!(outcome.arn, arn);
        assert!(!outcome.created);
        assert_eq!(outcome.status, CertificateStatus::Issued);
        assert_eq!(cloud.call_count("acm.request"), 0);
    }

    #[tokio::test]
    async fn test_missing_recorded_certificate_is_drift() {
        let cloud = MemoryCloud::new();
        let zone = cloud.seed_zone("example.com");

        let err = find_or_create_certificate(
            &cloud,
            &cloud,
            "example.com",
            &zone,
            Some("arn:aws:acm:us-east-1:000000000000:certificate/gone"),
            &fast_config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Drift { resource: "certificate", .. }));
    }
}
