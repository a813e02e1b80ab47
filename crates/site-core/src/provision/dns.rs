//! Hosted zone and record management

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{Error, ErrorCode};
use crate::traits::certificate::ValidationRecord;
use crate::traits::dns::{AliasTarget, ChangeAction, ChangeBatch, Dns, RecordSet, RecordType};
use crate::Result;

/// Hosted zone id shared by every CDN distribution, used as alias target zone
pub const CDN_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";

/// TTL of the certificate validation record
pub const VALIDATION_RECORD_TTL: u32 = 300;

const ZONE_ID_PREFIX: &str = "/hostedzone/";

/// Result of [`find_or_create_hosted_zone`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneOutcome {
    /// Zone id without the `/hostedzone/` prefix
    pub zone_id: String,
    /// Whether the zone was created during this call
    pub created: bool,
    pub name_servers: Vec<String>,
}

/// Strip the `/hostedzone/` prefix from a zone id
pub fn bare_zone_id(id: &str) -> &str {
    id.strip_prefix(ZONE_ID_PREFIX).unwrap_or(id)
}

/// Compare DNS names ignoring case and the trailing dot
pub fn same_name(a: &str, b: &str) -> bool {
    a.trim_end_matches('.')
        .eq_ignore_ascii_case(b.trim_end_matches('.'))
}

/// Find the hosted zone for `domain`, creating it if none exists
pub async fn find_or_create_hosted_zone(dns: &dyn Dns, domain: &str) -> Result<ZoneOutcome> {
    let zones = dns.list_zones_by_name(Some(domain)).await?;
    let (zone_id, created) = match zones.iter().find(|zone| same_name(&zone.name, domain)) {
        Some(zone) => {
            debug!("Found hosted zone {} for {}", zone.id, domain);
            (bare_zone_id(&zone.id).to_string(), false)
        }
        None => {
            let caller_reference = format!("create-hosted-zone-{}", Utc::now().timestamp_millis());
            let zone = dns.create_zone(domain, &caller_reference).await?;
            info!("Created hosted zone {} for {}", zone.id, domain);
            (bare_zone_id(&zone.id).to_string(), true)
        }
    };

    let detail = dns.get_zone(&zone_id).await?;
    Ok(ZoneOutcome {
        zone_id,
        created,
        name_servers: detail.name_servers,
    })
}

/// Re-read a recorded hosted zone, failing with drift if it is gone
///
/// # Returns
///
/// The zone's current name servers.
pub async fn verify_hosted_zone(dns: &dyn Dns, zone_id: &str) -> Result<Vec<String>> {
    match dns.get_zone(zone_id).await {
        Ok(detail) => Ok(detail.name_servers),
        Err(e) if e.is_code(&ErrorCode::NoSuchHostedZone) => Err(Error::drift("hosted zone", zone_id)),
        Err(e) => Err(e),
    }
}

/// Point `domain` at the CDN distribution with an alias `A` record
pub async fn upsert_alias_record(
    dns: &dyn Dns,
    zone_id: &str,
    domain: &str,
    cdn_domain: &str,
) -> Result<()> {
    let record = RecordSet::alias(
        domain,
        RecordType::A,
        AliasTarget {
            hosted_zone_id: CDN_HOSTED_ZONE_ID.to_string(),
            dns_name: cdn_domain.to_string(),
            evaluate_target_health: false,
        },
    );
    dns.change_records(zone_id, &ChangeBatch::single(ChangeAction::Upsert, record))
        .await?;
    debug!("Alias record {} -> {} in place", domain, cdn_domain);
    Ok(())
}

fn validation_record_set(record: &ValidationRecord) -> RecordSet {
    RecordSet::simple(
        record.name.clone(),
        RecordType::parse(&record.record_type).unwrap_or(RecordType::Cname),
        VALIDATION_RECORD_TTL,
        vec![record.value.clone()],
    )
}

/// Publish a certificate validation record
pub async fn upsert_validation_record(
    dns: &dyn Dns,
    zone_id: &str,
    record: &ValidationRecord,
) -> Result<()> {
    dns.change_records(
        zone_id,
        &ChangeBatch::single(ChangeAction::Upsert, validation_record_set(record)),
    )
    .await?;
    info!("Published validation record {}", record.name);
    Ok(())
}

fn is_already_gone(e: &Error) -> bool {
    e.is_code(&ErrorCode::InvalidChangeBatch) || e.is_code(&ErrorCode::NoSuchHostedZone)
}

/// Delete a certificate validation record
///
/// # Returns
///
/// `false` when the record (or its zone) was already gone.
pub async fn remove_validation_record(
    dns: &dyn Dns,
    zone_id: &str,
    record: &ValidationRecord,
) -> Result<bool> {
    match dns
        .change_records(
            zone_id,
            &ChangeBatch::single(ChangeAction::Delete, validation_record_set(record)),
        )
        .await
    {
        Ok(()) => {
            info!("Removed validation record {}", record.name);
            Ok(true)
        }
        Err(e) if is_already_gone(&e) => {
            debug!("Validation record {} already absent", record.name);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Delete the alias record of `domain` if it points at `cdn_domain`
///
/// Records pointing elsewhere are left alone.
///
/// # Returns
///
/// `false` when there was nothing to delete.
pub async fn remove_alias_record(
    dns: &dyn Dns,
    zone_id: &str,
    domain: &str,
    cdn_domain: &str,
) -> Result<bool> {
    let records = match dns.list_records(zone_id).await {
        Ok(records) => records,
        Err(e) if e.is_code(&ErrorCode::NoSuchHostedZone) => return Ok(false),
        Err(e) => return Err(e),
    };

    let alias = records.into_iter().find(|record| {
        record.record_type == RecordType::A
            && same_name(&record.name, domain)
            && record
                .alias_target
                .as_ref()
                .is_some_and(|target| same_name(&target.dns_name, cdn_domain))
    });
    let Some(alias) = alias else {
        debug!("No alias record for {} pointing at {}", domain, cdn_domain);
        return Ok(false);
    };

    match dns
        .change_records(zone_id, &ChangeBatch::single(ChangeAction::Delete, alias))
        .await
    {
        Ok(()) => {
            info!("Removed alias record {}", domain);
            Ok(true)
        }
        Err(e) if is_already_gone(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryCloud;

    #[test]
    fn test_zone_id_prefix_and_name_matching() {
        assert_eq!(bare_zone_id("/hostedzone/Z123"), "Z123");
        assert_eq!(bare_zone_id("Z123"), "Z123");
        assert!(same_name("Example.com.", "example.com"));
        assert!(!same_name("sub.example.com.", "example.com"));
    }

    #[tokio::test]
    async fn test_zone_found_by_exact_name_only() {
        let cloud = MemoryCloud::new();
        let parent = cloud.seed_zone("example.com");

        let found = find_or_create_hosted_zone(&cloud, "example.com").await.unwrap();
        assert_eq!(found.zone_id, parent);
        assert!(!found.created);
        assert!(!found.name_servers.is_empty());

        let sub = find_or_create_hosted_zone(&cloud, "sub.example.com").await.unwrap();
        assert!(sub.created);
        assert_ne!(sub.zone_id, parent);
        assert!(!sub.zone_id.starts_with('/'));
    }

    #[tokio::test]
    async fn test_record_removal_tolerates_absence() {
        let cloud = MemoryCloud::new();
        let zone = cloud.seed_zone("example.com");
        let record = ValidationRecord {
            name: "_abc.example.com.".to_string(),
            record_type: "CNAME".to_string(),
            value: "_xyz.acm-validations.aws.".to_string(),
        };

        upsert_validation_record(&cloud, &zone, &record).await.unwrap();
        assert!(remove_validation_record(&cloud, &zone, &record).await.unwrap());
        assert!(!remove_validation_record(&cloud, &zone, &record).await.unwrap());

        upsert_alias_record(&cloud, &zone, "example.com", "d1.cloudfront.net")
            .await
            .unwrap();
        assert!(!remove_alias_record(&cloud, &zone, "example.com", "d2.cloudfront.net")
            .await
            .unwrap());
        assert!(remove_alias_record(&cloud, &zone, "example.com", "d1.cloudfront.net")
            .await
            .unwrap());
        assert!(!remove_alias_record(&cloud, &zone, "example.com", "d1.cloudfront.net")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_missing_recorded_zone_is_drift() {
        let cloud = MemoryCloud::new();
        let err = verify_hosted_zone(&cloud, "ZMISSING").await.unwrap_err();
        assert!(matches!(err, Error::Drift { resource: "hosted zone", .. }));
    }
}
