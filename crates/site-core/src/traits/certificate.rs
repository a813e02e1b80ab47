// # Certificate Authority Trait
//
// Capability interface for TLS certificates validated through DNS.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Certificate lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateStatus {
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    ValidationTimedOut,
    Revoked,
    Failed,
}

/// Certificate summary from a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    pub arn: String,
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
}

impl CertificateSummary {
    /// Whether the certificate covers `domain` by primary or alternate name
    pub fn covers(&self, domain: &str) -> bool {
        self.domain_name.eq_ignore_ascii_case(domain)
            || self
                .subject_alternative_names
                .iter()
                .any(|name| name.eq_ignore_ascii_case(domain))
    }
}

/// How ownership is proven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationMethod {
    Dns,
    Email,
}

/// New certificate request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub domain_name: String,
    pub validation_method: ValidationMethod,
    pub subject_alternative_names: Vec<String>,
}

/// DNS record the authority wants to see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub name: String,
    /// Record type as reported (normally `CNAME`)
    pub record_type: String,
    pub value: String,
}

/// Validation state of one name on the certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainValidation {
    pub domain_name: String,
    /// Populated asynchronously after the request
    pub resource_record: Option<ValidationRecord>,
}

/// Full certificate description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDetail {
    pub arn: String,
    pub domain_name: String,
    pub status: CertificateStatus,
    pub domain_validation_options: Vec<DomainValidation>,
}

impl CertificateDetail {
    /// First published validation record, if any
    pub fn first_validation_record(&self) -> Option<&ValidationRecord> {
        self.domain_validation_options
            .iter()
            .find_map(|option| option.resource_record.as_ref())
    }

    /// First published CNAME validation record, if any
    pub fn cname_validation_record(&self) -> Option<&ValidationRecord> {
        self.domain_validation_options
            .iter()
            .filter_map(|option| option.resource_record.as_ref())
            .find(|record| record.record_type.eq_ignore_ascii_case("CNAME"))
    }
}

/// Trait for certificate authority implementations
///
/// # Error codes
///
/// - `NoSuchCertificate` when the identifier is unknown
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// List certificates in the account
    async fn list(&self) -> Result<Vec<CertificateSummary>>;

    /// Request a certificate, returning its identifier
    async fn request(&self, request: &CertificateRequest) -> Result<String>;

    /// Describe a certificate
    async fn describe(&self, arn: &str) -> Result<CertificateDetail>;
}
