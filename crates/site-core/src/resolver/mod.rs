//! Desired-configuration resolver
//!
//! Merges the user configuration, the persisted deployment state and the
//! defaults into one [`DesiredConfig`]. Region, bucket name and domain are
//! immutable once recorded; changing them is refused with
//! [`Error::BreakingChange`] before any cloud call is made.

pub mod domain;

use rand::Rng;
use std::path::{Path, PathBuf};

use crate::config::SiteConfig;
use crate::state::DeploymentState;
use crate::{Error, Result};

pub use domain::normalize_domain;

/// Region used when neither state nor configuration names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default index and error document
pub const DEFAULT_DOCUMENT: &str = "index.html";

const GENERATED_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdef";
const GENERATED_SUFFIX_LEN: usize = 8;

/// Authoritative configuration for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfig {
    pub region: String,
    /// Normalized custom domain
    pub domain: Option<String>,
    /// Absolute content directory; `None` uploads the placeholder page
    pub src: Option<PathBuf>,
    pub bucket_name: String,
    pub index_document: String,
    pub error_document: String,
    pub distribution_description: String,
}

/// Resolve the desired configuration
///
/// # Parameters
///
/// - `config`: User configuration
/// - `state`: Persisted deployment state
/// - `instance_name`: Used to generate a bucket name when none is given
/// - `workspace_root`: Root that `config.src` is relative to
///
/// # Errors
///
/// - `BreakingChange` when region, bucket name or domain differ from state
/// - `InvalidDomain` when the domain is malformed
/// - `MissingPath` when `src` is not an existing directory
pub fn resolve(
    config: &SiteConfig,
    state: &DeploymentState,
    instance_name: &str,
    workspace_root: &Path,
) -> Result<DesiredConfig> {
    let region = resolve_region(config, state)?;
    let domain = resolve_domain(config, state)?;
    let bucket_name = resolve_bucket_name(config, state, domain.as_deref(), instance_name)?;
    let src = resolve_src(config, workspace_root)?;

    let index_document = non_empty(config.aws.s3_index_file.as_deref())
        .unwrap_or(DEFAULT_DOCUMENT)
        .to_string();
    let error_document = non_empty(config.aws.s3_error_file.as_deref())
        .unwrap_or(DEFAULT_DOCUMENT)
        .to_string();
    let distribution_description =
        match non_empty(config.aws.cloudfront_distribution_description.as_deref()) {
            Some(description) => description.to_string(),
            None => format!(
                "{} - Distribution for bucket \"{}\"",
                bucket_name, bucket_name
            ),
        };

    Ok(DesiredConfig {
        region,
        domain,
        src,
        bucket_name,
        index_document,
        error_document,
        distribution_description,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn resolve_region(config: &SiteConfig, state: &DeploymentState) -> Result<String> {
    let requested = non_empty(config.aws.region.as_deref());
    match (state.aws.region.as_deref(), requested) {
        (Some(recorded), Some(requested)) if recorded != requested => Err(Error::BreakingChange {
            field: "region",
            from: recorded.to_string(),
            to: requested.to_string(),
        }),
        (Some(recorded), _) => Ok(recorded.to_string()),
        (None, Some(requested)) => Ok(requested.to_string()),
        (None, None) => Ok(DEFAULT_REGION.to_string()),
    }
}

fn resolve_domain(config: &SiteConfig, state: &DeploymentState) -> Result<Option<String>> {
    let requested = match non_empty(config.domain.as_deref()) {
        Some(raw) => Some(normalize_domain(raw)?),
        None => None,
    };
    match (state.domain.as_deref(), requested) {
        (Some(recorded), Some(requested)) if recorded != requested => Err(Error::BreakingChange {
            field: "domain",
            from: recorded.to_string(),
            to: requested,
        }),
        (Some(recorded), _) => Ok(Some(recorded.to_string())),
        (None, requested) => Ok(requested),
    }
}

fn resolve_bucket_name(
    config: &SiteConfig,
    state: &DeploymentState,
    domain: Option<&str>,
    instance_name: &str,
) -> Result<String> {
    let requested = non_empty(config.aws.s3_bucket_name.as_deref());
    match (state.aws.s3_bucket_name.as_deref(), requested) {
        (Some(recorded), Some(requested)) if recorded != requested => Err(Error::BreakingChange {
            field: "bucket name",
            from: recorded.to_string(),
            to: requested.to_string(),
        }),
        (Some(recorded), _) => Ok(recorded.to_string()),
        (None, Some(requested)) => Ok(requested.to_string()),
        (None, None) => Ok(match domain {
            Some(domain) => domain.to_string(),
            None => generate_bucket_name(instance_name),
        }),
    }
}

fn resolve_src(config: &SiteConfig, workspace_root: &Path) -> Result<Option<PathBuf>> {
    let Some(src) = non_empty(config.src.as_deref()) else {
        return Ok(None);
    };
    let path = workspace_root.join(src.trim_start_matches('/'));
    if path.is_dir() {
        Ok(Some(path))
    } else {
        Err(Error::MissingPath {
            path: src.to_string(),
        })
    }
}

/// `website-<instance>-<8 hex chars>`
pub fn generate_bucket_name(instance_name: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..GENERATED_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..GENERATED_SUFFIX_ALPHABET.len());
            GENERATED_SUFFIX_ALPHABET[idx] as char
        })
        .collect();
    format!("website-{}-{}", instance_name.to_lowercase(), suffix)
}
