// # Memory Cloud
//
// In-process simulation of the four resource APIs.
//
// ## Purpose
//
// Lets the reconciler run end to end without a network: rehearsal runs from
// the CLI and the whole test suite reconcile against it.
//
// ## Behaviour
//
// - Provider error codes follow the capability trait contracts
// - Every call is appended to a call log; `mutating_calls()` counts writes
// - Distribution configs carry etags; stale tokens fail with
//   `PreconditionFailed`
// - Record deletes must match the stored record exactly, otherwise
//   `InvalidChangeBatch`
//
// ## Fault Injection
//
// - Bucket visibility lag after creation
// - Certificates that validate, never validate, or issue after N describes
// - Viewer-certificate rejections on distribution updates
// - Distribution deployment lag
// - Out-of-band removal of buckets, distributions, zones and certificates
//
// Clones share the same simulated account.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, ErrorCode, Service};
use crate::provision::dns::{bare_zone_id as bare_id, same_name};
use crate::traits::cdn::{
    Cdn, Distribution, DistributionConfig, DistributionStatus, InvalidationBatch,
    TaggedDistributionConfig, ViewerCertificate,
};
use crate::traits::certificate::{
    CertificateAuthority, CertificateDetail, CertificateRequest, CertificateStatus,
    CertificateSummary, DomainValidation, ValidationRecord,
};
use crate::traits::dns::{
    ChangeAction, ChangeBatch, Dns, HostedZone, HostedZoneDetail, RecordSet, RecordType,
};
use crate::traits::object_storage::{
    CorsRule, ObjectListing, ObjectStorage, PublicAccessBlock, PutObjectRequest,
    WebsiteConfiguration,
};
use crate::traits::{Credentials, ResourceClients, ResourceClientsFactory};
use crate::Result;

const ACCOUNT_ID: &str = "000000000000";
const LIST_PAGE_SIZE: usize = 1000;

/// Calls that change the simulated account
const MUTATING_CALLS: &[&str] = &[
    "s3.create_bucket",
    "s3.put_website_config",
    "s3.put_policy",
    "s3.put_cors",
    "s3.put_public_access_block",
    "s3.put_object",
    "s3.delete_objects",
    "s3.delete_bucket",
    "cloudfront.create",
    "cloudfront.update",
    "cloudfront.delete",
    "cloudfront.invalidate",
    "route53.create_zone",
    "route53.change_records",
    "acm.request",
];

/// How requested certificates progress through validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateBehavior {
    /// Issued once its validation record is published in a hosted zone
    #[default]
    IssueWhenValidated,
    /// Stays pending forever
    NeverValidates,
    /// Issued on the describe after the given number of describes
    IssueAfterDescribes(u32),
}

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct BucketState {
    website: Option<WebsiteConfiguration>,
    policy: Option<String>,
    cors: Vec<CorsRule>,
    access_block: Option<PublicAccessBlock>,
    objects: BTreeMap<String, StoredObject>,
    /// Head requests still answered with NotFound
    invisible_heads: u32,
}

#[derive(Debug)]
struct DistributionState {
    distribution: Distribution,
    etag: u64,
    /// Status reads still answered with InProgress
    pending_reads: u32,
}

#[derive(Debug)]
struct ZoneState {
    name: String,
    caller_reference: Option<String>,
    name_servers: Vec<String>,
    records: Vec<RecordSet>,
}

#[derive(Debug)]
struct CertificateState {
    domain: String,
    alternative_names: Vec<String>,
    status: CertificateStatus,
    validation: ValidationRecord,
    describes: u32,
}

#[derive(Debug, Default)]
struct CloudState {
    next_id: u64,
    calls: Vec<String>,

    buckets: BTreeMap<String, BucketState>,
    foreign_buckets: HashSet<String>,
    bucket_visibility_lag: u32,

    distributions: BTreeMap<String, DistributionState>,
    invalidations: Vec<(String, InvalidationBatch)>,
    distribution_deploy_lag: u32,
    viewer_certificate_rejections: u32,

    zones: BTreeMap<String, ZoneState>,

    certificates: BTreeMap<String, CertificateState>,
    certificate_behavior: CertificateBehavior,

    regions: Vec<String>,
}

impl CloudState {
    fn record(&mut self, call: &str) {
        self.calls.push(call.to_string());
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn bucket_mut(&mut self, bucket: &str) -> Result<&mut BucketState> {
        match self.buckets.get_mut(bucket) {
            Some(state) if state.invisible_heads == 0 => Ok(state),
            _ => Err(s3_error(
                ErrorCode::NoSuchBucket,
                format!("The specified bucket does not exist: {}", bucket),
            )),
        }
    }

    fn distribution_mut(&mut self, id: &str) -> Result<&mut DistributionState> {
        self.distributions.get_mut(id).ok_or_else(|| {
            cdn_error(
                ErrorCode::NoSuchDistribution,
                format!("The specified distribution does not exist: {}", id),
            )
        })
    }

    fn zone_mut(&mut self, zone_id: &str) -> Result<&mut ZoneState> {
        let bare = bare_id(zone_id).to_string();
        self.zones.get_mut(&bare).ok_or_else(|| {
            dns_error(
                ErrorCode::NoSuchHostedZone,
                format!("No hosted zone found with ID: {}", bare),
            )
        })
    }

    fn validation_published(&self, record: &ValidationRecord) -> bool {
        self.zones.values().any(|zone| {
            zone.records.iter().any(|set| {
                set.record_type == RecordType::Cname
                    && same_name(&set.name, &record.name)
                    && set.values.iter().any(|v| same_name(v, &record.value))
            })
        })
    }

    fn certificate_status(&self, arn: &str) -> Option<CertificateStatus> {
        self.certificates.get(arn).map(|c| c.status)
    }
}

fn s3_error(code: ErrorCode, message: impl Into<String>) -> Error {
    Error::api(Service::ObjectStorage, code, message)
}

fn cdn_error(code: ErrorCode, message: impl Into<String>) -> Error {
    Error::api(Service::Cdn, code, message)
}

fn dns_error(code: ErrorCode, message: impl Into<String>) -> Error {
    Error::api(Service::Dns, code, message)
}

fn acm_error(code: ErrorCode, message: impl Into<String>) -> Error {
    Error::api(Service::CertificateAuthority, code, message)
}

fn fqdn(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}

fn records_equal(a: &RecordSet, b: &RecordSet) -> bool {
    let alias_equal = match (&a.alias_target, &b.alias_target) {
        (None, None) => true,
        (Some(x), Some(y)) => {
            x.hosted_zone_id == y.hosted_zone_id && same_name(&x.dns_name, &y.dns_name)
        }
        _ => false,
    };
    same_name(&a.name, &b.name)
        && a.record_type == b.record_type
        && a.ttl == b.ttl
        && a.values == b.values
        && alias_equal
}

/// Simulated cloud account
#[derive(Debug, Clone, Default)]
pub struct MemoryCloud {
    inner: Arc<Mutex<CloudState>>,
}

impl MemoryCloud {
    /// Create an empty account
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ---- call log ----

    /// Every call made so far, as `service.operation`
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of calls to one operation
    pub fn call_count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| c.as_str() == call).count()
    }

    /// Number of calls that changed the account
    pub fn mutating_calls(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| MUTATING_CALLS.contains(&c.as_str()))
            .count()
    }

    /// Forget the call log
    pub fn reset_calls(&self) {
        self.state().calls.clear();
    }

    /// Regions resource clients were created for
    pub fn regions(&self) -> Vec<String> {
        self.state().regions.clone()
    }

    // ---- fault injection ----

    /// New buckets answer `NotFound` to the first `heads` head requests
    pub fn set_bucket_visibility_lag(&self, heads: u32) {
        self.state().bucket_visibility_lag = heads;
    }

    /// Mark a bucket name as owned by another account
    pub fn claim_foreign_bucket(&self, bucket: &str) {
        self.state().foreign_buckets.insert(bucket.to_string());
    }

    /// How certificates requested from now on validate
    pub fn set_certificate_behavior(&self, behavior: CertificateBehavior) {
        self.state().certificate_behavior = behavior;
    }

    /// Reject the next `count` certificate changes on distributions
    pub fn reject_viewer_certificate(&self, count: u32) {
        self.state().viewer_certificate_rejections = count;
    }

    /// Distributions report `InProgress` for `reads` status reads after a change
    pub fn set_distribution_deploy_lag(&self, reads: u32) {
        self.state().distribution_deploy_lag = reads;
    }

    /// Delete a bucket behind the reconciler's back
    pub fn remove_bucket_out_of_band(&self, bucket: &str) {
        self.state().buckets.remove(bucket);
    }

    /// Delete a distribution behind the reconciler's back
    pub fn remove_distribution_out_of_band(&self, id: &str) {
        self.state().distributions.remove(id);
    }

    /// Delete a hosted zone behind the reconciler's back
    pub fn remove_zone_out_of_band(&self, zone_id: &str) {
        let bare = bare_id(zone_id).to_string();
        self.state().zones.remove(&bare);
    }

    /// Delete a certificate behind the reconciler's back
    pub fn remove_certificate_out_of_band(&self, arn: &str) {
        self.state().certificates.remove(arn);
    }

    // ---- seeding ----

    /// Create a hosted zone directly, returning its bare id
    pub fn seed_zone(&self, name: &str) -> String {
        let mut state = self.state();
        insert_zone(&mut state, name, None)
    }

    /// Create an issued certificate directly, returning its identifier
    pub fn seed_issued_certificate(&self, domain: &str) -> String {
        let mut state = self.state();
        let arn = insert_certificate(&mut state, domain, vec![domain.to_string()]);
        if let Some(certificate) = state.certificates.get_mut(&arn) {
            certificate.status = CertificateStatus::Issued;
        }
        arn
    }

    // ---- inspection ----

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.state().buckets.contains_key(bucket)
    }

    pub fn bucket_count(&self) -> usize {
        self.state().buckets.len()
    }

    /// Keys stored in a bucket, sorted
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key).cloned())
    }

    /// Website configuration of a bucket, if hosting is on
    pub fn website_config(&self, bucket: &str) -> Option<WebsiteConfiguration> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|b| b.website.clone())
    }

    /// Whether a bucket has a policy and open access block
    pub fn bucket_is_public(&self, bucket: &str) -> bool {
        self.state().buckets.get(bucket).is_some_and(|b| {
            b.policy.is_some() && b.access_block == Some(PublicAccessBlock::default())
        })
    }

    pub fn distribution(&self, id: &str) -> Option<Distribution> {
        self.state()
            .distributions
            .get(id)
            .map(|d| d.distribution.clone())
    }

    pub fn distribution_count(&self) -> usize {
        self.state().distributions.len()
    }

    /// Invalidations requested for a distribution
    pub fn invalidation_count(&self, id: &str) -> usize {
        self.state()
            .invalidations
            .iter()
            .filter(|(distribution, _)| distribution == id)
            .count()
    }

    pub fn zone_count(&self) -> usize {
        self.state().zones.len()
    }

    /// Record sets of a zone
    pub fn records(&self, zone_id: &str) -> Vec<RecordSet> {
        self.state()
            .zones
            .get(bare_id(zone_id))
            .map(|z| z.records.clone())
            .unwrap_or_default()
    }

    pub fn certificate_count(&self) -> usize {
        self.state().certificates.len()
    }

    pub fn certificate_status(&self, arn: &str) -> Option<CertificateStatus> {
        self.state().certificate_status(arn)
    }
}

fn insert_zone(state: &mut CloudState, name: &str, caller_reference: Option<&str>) -> String {
    let n = state.next();
    let id = format!("Z{:012X}", n);
    let name_servers: Vec<String> = (1..=4)
        .map(|i| format!("ns-{}.awsdns-{:02}.example", n * 4 + i, i))
        .collect();
    let zone_name = fqdn(name);
    let records = vec![
        RecordSet::simple(zone_name.clone(), RecordType::Ns, 172_800, name_servers.clone()),
        RecordSet::simple(
            zone_name.clone(),
            RecordType::Soa,
            900,
            vec![format!("{} awsdns-hostmaster.example. 1 7200 900 1209600 86400", name_servers[0])],
        ),
    ];
    state.zones.insert(
        id.clone(),
        ZoneState {
            name: zone_name,
            caller_reference: caller_reference.map(str::to_string),
            name_servers,
            records,
        },
    );
    id
}

fn insert_certificate(state: &mut CloudState, domain: &str, alternative_names: Vec<String>) -> String {
    let n = state.next();
    let arn = format!(
        "arn:aws:acm:us-east-1:{}:certificate/{:08x}-0000-4000-8000-{:012x}",
        ACCOUNT_ID, n, n
    );
    let validation = ValidationRecord {
        name: format!("_{:032x}.{}", n, fqdn(domain)),
        record_type: "CNAME".to_string(),
        value: format!("_{:032x}.acm-validations.aws.", n * 7919),
    };
    state.certificates.insert(
        arn.clone(),
        CertificateState {
            domain: domain.to_string(),
            alternative_names,
            status: CertificateStatus::PendingValidation,
            validation,
            describes: 0,
        },
    );
    arn
}

#[async_trait]
impl ObjectStorage for MemoryCloud {
    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.state();
        state.record("s3.head_bucket");
        if state.foreign_buckets.contains(bucket) {
            return Err(s3_error(ErrorCode::Forbidden, "Forbidden"));
        }
        match state.buckets.get_mut(bucket) {
            Some(b) if b.invisible_heads > 0 => {
                b.invisible_heads -= 1;
                Err(s3_error(ErrorCode::NotFound, "Not Found"))
            }
            Some(_) => Ok(()),
            None => Err(s3_error(ErrorCode::NotFound, "Not Found")),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.state();
        state.record("s3.create_bucket");
        if state.foreign_buckets.contains(bucket) || state.buckets.contains_key(bucket) {
            return Err(s3_error(
                ErrorCode::BucketAlreadyExists,
                format!("The requested bucket name is not available: {}", bucket),
            ));
        }
        let invisible_heads = state.bucket_visibility_lag;
        state.buckets.insert(
            bucket.to_string(),
            BucketState {
                invisible_heads,
                ..BucketState::default()
            },
        );
        Ok(())
    }

    async fn get_website_config(&self, bucket: &str) -> Result<WebsiteConfiguration> {
        let mut state = self.state();
        state.record("s3.get_website_config");
        state.bucket_mut(bucket)?.website.clone().ok_or_else(|| {
            s3_error(
                ErrorCode::NoSuchWebsiteConfiguration,
                "The specified bucket does not have a website configuration",
            )
        })
    }

    async fn put_website_config(
        &self,
        bucket: &str,
        config: &WebsiteConfiguration,
    ) -> Result<()> {
        let mut state = self.state();
        state.record("s3.put_website_config");
        state.bucket_mut(bucket)?.website = Some(config.clone());
        Ok(())
    }

    async fn put_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        let mut state = self.state();
        state.record("s3.put_policy");
        serde_json::from_str::<serde_json::Value>(policy)
            .map_err(|e| s3_error(ErrorCode::Other("MalformedPolicy".into()), e.to_string()))?;
        state.bucket_mut(bucket)?.policy = Some(policy.to_string());
        Ok(())
    }

    async fn put_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()> {
        let mut state = self.state();
        state.record("s3.put_cors");
        state.bucket_mut(bucket)?.cors = rules.to_vec();
        Ok(())
    }

    async fn put_public_access_block(
        &self,
        bucket: &str,
        block: &PublicAccessBlock,
    ) -> Result<()> {
        let mut state = self.state();
        state.record("s3.put_public_access_block");
        state.bucket_mut(bucket)?.access_block = Some(*block);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<&str>,
    ) -> Result<ObjectListing> {
        let mut state = self.state();
        state.record("s3.list_objects");
        let objects = &state.bucket_mut(bucket)?.objects;
        let keys: Vec<String> = match continuation {
            Some(after) => objects
                .keys()
                .filter(|k| k.as_str() > after)
                .take(LIST_PAGE_SIZE)
                .cloned()
                .collect(),
            None => objects.keys().take(LIST_PAGE_SIZE).cloned().collect(),
        };
        let next_token = match keys.last() {
            Some(last) if objects.keys().any(|k| k > last) => Some(last.clone()),
            _ => None,
        };
        Ok(ObjectListing { keys, next_token })
    }

    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        let mut state = self.state();
        state.record("s3.put_object");
        state.bucket_mut(&request.bucket)?.objects.insert(
            request.key,
            StoredObject {
                body: request.body,
                content_type: request.content_type,
            },
        );
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        let mut state = self.state();
        state.record("s3.delete_objects");
        if keys.len() > LIST_PAGE_SIZE {
            return Err(s3_error(
                ErrorCode::Other("MalformedXML".into()),
                "At most 1000 keys may be deleted per request",
            ));
        }
        let objects = &mut state.bucket_mut(bucket)?.objects;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut state = self.state();
        state.record("s3.delete_bucket");
        if !state.bucket_mut(bucket)?.objects.is_empty() {
            return Err(s3_error(
                ErrorCode::Other("BucketNotEmpty".into()),
                "The bucket you tried to delete is not empty",
            ));
        }
        state.buckets.remove(bucket);
        Ok(())
    }
}

#[async_trait]
impl Cdn for MemoryCloud {
    async fn create(&self, config: &DistributionConfig) -> Result<Distribution> {
        let mut state = self.state();
        state.record("cloudfront.create");
        let n = state.next();
        let id = format!("E{:013X}", n);
        let distribution = Distribution {
            arn: format!("arn:aws:cloudfront::{}:distribution/{}", ACCOUNT_ID, id),
            domain_name: format!("d{:013x}.cloudfront.net", n),
            id: id.clone(),
            status: DistributionStatus::InProgress,
            config: config.clone(),
        };
        let pending_reads = state.distribution_deploy_lag;
        state.distributions.insert(
            id,
            DistributionState {
                distribution: distribution.clone(),
                etag: 1,
                pending_reads,
            },
        );
        Ok(distribution)
    }

    async fn get(&self, id: &str) -> Result<Distribution> {
        let mut state = self.state();
        state.record("cloudfront.get");
        let entry = state.distribution_mut(id)?;
        if entry.pending_reads > 0 {
            entry.pending_reads -= 1;
            entry.distribution.status = DistributionStatus::InProgress;
        } else {
            entry.distribution.status = DistributionStatus::Deployed;
        }
        Ok(entry.distribution.clone())
    }

    async fn get_config(&self, id: &str) -> Result<TaggedDistributionConfig> {
        let mut state = self.state();
        state.record("cloudfront.get_config");
        let entry = state.distribution_mut(id)?;
        Ok(TaggedDistributionConfig {
            config: entry.distribution.config.clone(),
            etag: format!("ETAG{}", entry.etag),
        })
    }

    async fn update(&self, id: &str, config: &DistributionConfig, if_match: &str) -> Result<String> {
        let mut state = self.state();
        state.record("cloudfront.update");

        let (current_etag, current_arn) = {
            let entry = state.distribution_mut(id)?;
            (
                format!("ETAG{}", entry.etag),
                entry
                    .distribution
                    .config
                    .viewer_certificate
                    .certificate_arn()
                    .map(str::to_string),
            )
        };
        if if_match != current_etag {
            return Err(cdn_error(
                ErrorCode::PreconditionFailed,
                "The If-Match version is missing or not valid",
            ));
        }

        if let ViewerCertificate::Acm {
            certificate_arn, ..
        } = &config.viewer_certificate
        {
            if current_arn.as_deref() != Some(certificate_arn.as_str()) {
                if state.viewer_certificate_rejections > 0 {
                    state.viewer_certificate_rejections -= 1;
                    return Err(cdn_error(
                        ErrorCode::InvalidViewerCertificate,
                        "The specified SSL certificate doesn't exist, isn't in us-east-1 region, isn't valid, or doesn't include a valid certificate chain",
                    ));
                }
                if state.certificate_status(certificate_arn) != Some(CertificateStatus::Issued) {
                    return Err(cdn_error(
                        ErrorCode::InvalidViewerCertificate,
                        format!("Certificate {} is not issued", certificate_arn),
                    ));
                }
            }
        }

        let lag = state.distribution_deploy_lag;
        let entry = state.distribution_mut(id)?;
        entry.distribution.config = config.clone();
        entry.distribution.status = DistributionStatus::InProgress;
        entry.pending_reads = lag;
        entry.etag += 1;
        Ok(format!("ETAG{}", entry.etag))
    }

    async fn delete(&self, id: &str, if_match: &str) -> Result<()> {
        let mut state = self.state();
        state.record("cloudfront.delete");
        let entry = state.distribution_mut(id)?;
        if if_match != format!("ETAG{}", entry.etag) {
            return Err(cdn_error(
                ErrorCode::PreconditionFailed,
                "The If-Match version is missing or not valid",
            ));
        }
        if entry.distribution.config.enabled || entry.pending_reads > 0 {
            return Err(cdn_error(
                ErrorCode::DistributionNotDisabled,
                "The distribution you are trying to delete has not been disabled",
            ));
        }
        state.distributions.remove(id);
        Ok(())
    }

    async fn invalidate(&self, id: &str, batch: &InvalidationBatch) -> Result<String> {
        let mut state = self.state();
        state.record("cloudfront.invalidate");
        state.distribution_mut(id)?;
        let n = state.next();
        state.invalidations.push((id.to_string(), batch.clone()));
        Ok(format!("I{:013X}", n))
    }
}

#[async_trait]
impl Dns for MemoryCloud {
    async fn list_zones_by_name(&self, dns_name: Option<&str>) -> Result<Vec<HostedZone>> {
        let mut state = self.state();
        state.record("route53.list_zones_by_name");
        let mut zones: Vec<HostedZone> = state
            .zones
            .iter()
            .map(|(id, zone)| HostedZone {
                id: format!("/hostedzone/{}", id),
                name: zone.name.clone(),
            })
            .collect();
        zones.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(start) = dns_name {
            let start = fqdn(&start.to_ascii_lowercase());
            zones.retain(|zone| zone.name.to_ascii_lowercase() >= start);
        }
        Ok(zones)
    }

    async fn create_zone(&self, name: &str, caller_reference: &str) -> Result<HostedZone> {
        let mut state = self.state();
        state.record("route53.create_zone");
        if let Some((id, zone)) = state
            .zones
            .iter()
            .find(|(_, zone)| zone.caller_reference.as_deref() == Some(caller_reference))
        {
            return Ok(HostedZone {
                id: format!("/hostedzone/{}", id),
                name: zone.name.clone(),
            });
        }
        let id = insert_zone(&mut state, name, Some(caller_reference));
        Ok(HostedZone {
            id: format!("/hostedzone/{}", id),
            name: fqdn(name),
        })
    }

    async fn get_zone(&self, zone_id: &str) -> Result<HostedZoneDetail> {
        let mut state = self.state();
        state.record("route53.get_zone");
        let bare = bare_id(zone_id).to_string();
        let zone = state.zone_mut(&bare)?;
        Ok(HostedZoneDetail {
            zone: HostedZone {
                id: format!("/hostedzone/{}", bare),
                name: zone.name.clone(),
            },
            name_servers: zone.name_servers.clone(),
        })
    }

    async fn list_records(&self, zone_id: &str) -> Result<Vec<RecordSet>> {
        let mut state = self.state();
        state.record("route53.list_records");
        Ok(state.zone_mut(zone_id)?.records.clone())
    }

    async fn change_records(&self, zone_id: &str, batch: &ChangeBatch) -> Result<()> {
        let mut state = self.state();
        state.record("route53.change_records");
        let zone = state.zone_mut(zone_id)?;

        // Validate the whole batch first; changes apply atomically
        let mut records = zone.records.clone();
        for change in &batch.changes {
            let set = &change.record_set;
            let position = records.iter().position(|existing| {
                same_name(&existing.name, &set.name) && existing.record_type == set.record_type
            });
            match (change.action, position) {
                (ChangeAction::Create, Some(_)) => {
                    return Err(dns_error(
                        ErrorCode::InvalidChangeBatch,
                        format!("Tried to create resource record set {} but it already exists", set.name),
                    ));
                }
                (ChangeAction::Create, None) | (ChangeAction::Upsert, None) => {
                    records.push(set.clone());
                }
                (ChangeAction::Upsert, Some(index)) => records[index] = set.clone(),
                (ChangeAction::Delete, Some(index)) if records_equal(&records[index], set) => {
                    records.remove(index);
                }
                (ChangeAction::Delete, _) => {
                    return Err(dns_error(
                        ErrorCode::InvalidChangeBatch,
                        format!("Tried to delete resource record set {} but it was not found", set.name),
                    ));
                }
            }
        }
        zone.records = records;
        Ok(())
    }
}

#[async_trait]
impl CertificateAuthority for MemoryCloud {
    async fn list(&self) -> Result<Vec<CertificateSummary>> {
        let mut state = self.state();
        state.record("acm.list");
        Ok(state
            .certificates
            .iter()
            .map(|(arn, c)| CertificateSummary {
                arn: arn.clone(),
                domain_name: c.domain.clone(),
                subject_alternative_names: c.alternative_names.clone(),
            })
            .collect())
    }

    async fn request(&self, request: &CertificateRequest) -> Result<String> {
        let mut state = self.state();
        state.record("acm.request");
        Ok(insert_certificate(
            &mut state,
            &request.domain_name,
            request.subject_alternative_names.clone(),
        ))
    }

    async fn describe(&self, arn: &str) -> Result<CertificateDetail> {
        let mut state = self.state();
        state.record("acm.describe");

        let behavior = state.certificate_behavior;
        let (status, validation, describes) = {
            let certificate = state.certificates.get_mut(arn).ok_or_else(|| {
                acm_error(
                    ErrorCode::NoSuchCertificate,
                    format!("Could not find certificate {}", arn),
                )
            })?;
            certificate.describes += 1;
            (
                certificate.status,
                certificate.validation.clone(),
                certificate.describes,
            )
        };

        let issue = status == CertificateStatus::PendingValidation
            && match behavior {
                CertificateBehavior::IssueWhenValidated => state.validation_published(&validation),
                CertificateBehavior::NeverValidates => false,
                CertificateBehavior::IssueAfterDescribes(n) => describes > n,
            };

        let certificate = state.certificates.get_mut(arn).ok_or_else(|| {
            acm_error(ErrorCode::NoSuchCertificate, format!("Could not find certificate {}", arn))
        })?;
        if issue {
            certificate.status = CertificateStatus::Issued;
        }
        Ok(CertificateDetail {
            arn: arn.to_string(),
            domain_name: certificate.domain.clone(),
            status: certificate.status,
            domain_validation_options: vec![DomainValidation {
                domain_name: certificate.domain.clone(),
                resource_record: Some(certificate.validation.clone()),
            }],
        })
    }
}

/// Hands out clients bound to one shared [`MemoryCloud`]
#[derive(Debug, Clone, Default)]
pub struct MemoryBackendFactory {
    cloud: MemoryCloud,
}

impl MemoryBackendFactory {
    pub fn new(cloud: MemoryCloud) -> Self {
        Self { cloud }
    }

    /// The simulated account behind this factory
    pub fn cloud(&self) -> &MemoryCloud {
        &self.cloud
    }
}

impl ResourceClientsFactory for MemoryBackendFactory {
    fn create(&self, credentials: &Credentials, region: &str) -> Result<ResourceClients> {
        credentials.validate()?;
        self.cloud.state().regions.push(region.to_string());
        Ok(ResourceClients {
            storage: Arc::new(self.cloud.clone()),
            cdn: Arc::new(self.cloud.clone()),
            dns: Arc::new(self.cloud.clone()),
            certificates: Arc::new(self.cloud.clone()),
        })
    }
}
