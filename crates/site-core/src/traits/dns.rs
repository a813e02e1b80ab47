// # DNS Trait
//
// Capability interface for hosted zones and the record sets inside them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Hosted zone summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// Zone id, possibly prefixed with `/hostedzone/`
    pub id: String,
    /// Zone name, usually with a trailing dot
    pub name: String,
}

/// Hosted zone with its delegation set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedZoneDetail {
    pub zone: HostedZone,
    /// Authoritative name servers
    pub name_servers: Vec<String>,
}

/// Record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
    Ns,
    Soa,
}

impl RecordType {
    /// Parse a record type as reported by the certificate authority
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "A" => Some(RecordType::A),
            "AAAA" => Some(RecordType::Aaaa),
            "CNAME" => Some(RecordType::Cname),
            "TXT" => Some(RecordType::Txt),
            "NS" => Some(RecordType::Ns),
            "SOA" => Some(RecordType::Soa),
            _ => None,
        }
    }
}

/// Alias target of an alias record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTarget {
    /// Hosted zone id of the target service
    pub hosted_zone_id: String,
    pub dns_name: String,
    pub evaluate_target_health: bool,
}

/// A record set
///
/// Either `values` (with a `ttl`) or `alias_target` is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: Option<u32>,
    pub values: Vec<String>,
    pub alias_target: Option<AliasTarget>,
}

impl RecordSet {
    /// Plain record with values
    pub fn simple(
        name: impl Into<String>,
        record_type: RecordType,
        ttl: u32,
        values: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            ttl: Some(ttl),
            values,
            alias_target: None,
        }
    }

    /// Alias record
    pub fn alias(name: impl Into<String>, record_type: RecordType, target: AliasTarget) -> Self {
        Self {
            name: name.into(),
            record_type,
            ttl: None,
            values: Vec::new(),
            alias_target: Some(target),
        }
    }
}

/// Kind of change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Create,
    Delete,
    Upsert,
}

/// One change inside a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub action: ChangeAction,
    pub record_set: RecordSet,
}

/// Atomic batch of record changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub changes: Vec<Change>,
}

impl ChangeBatch {
    /// Batch with a single change
    pub fn single(action: ChangeAction, record_set: RecordSet) -> Self {
        Self {
            changes: vec![Change { action, record_set }],
        }
    }
}

/// Trait for DNS implementations
///
/// # Error codes
///
/// - `NoSuchHostedZone` when the zone id is unknown
/// - `InvalidChangeBatch` when a delete targets a missing record (or a create
///   an existing one)
#[async_trait]
pub trait Dns: Send + Sync {
    /// List zones, ordered by name, starting at `dns_name` if given
    async fn list_zones_by_name(&self, dns_name: Option<&str>) -> Result<Vec<HostedZone>>;

    /// Create a zone; `caller_reference` makes the request idempotent
    async fn create_zone(&self, name: &str, caller_reference: &str) -> Result<HostedZone>;

    /// Fetch a zone and its name servers
    async fn get_zone(&self, zone_id: &str) -> Result<HostedZoneDetail>;

    /// List every record set of a zone
    async fn list_records(&self, zone_id: &str) -> Result<Vec<RecordSet>>;

    /// Apply a change batch atomically
    async fn change_records(&self, zone_id: &str, batch: &ChangeBatch) -> Result<()>;
}
