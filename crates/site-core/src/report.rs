//! Execution report
//!
//! Every action ends with one report: a status, the curated outputs read from
//! the deployment document, warnings collected along the way and, on failure,
//! the error message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::DeploymentState;

/// Dotted keys of the deployment document that are reported as outputs
pub const OUTPUT_STATE_KEYS: &[&str] = &[
    "domain",
    "aws.s3BucketWebsiteUrl",
    "aws.cloudfrontDistributionUrl",
    "aws.route53HostedZoneNameservers",
];

/// Status of a successful run
pub const STATUS_SUCCESS: i32 = 0;

/// Status of a failed run
pub const STATUS_FAILURE: i32 = 1;

/// Result of one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// `0` for success, `1` for failure
    pub status: i32,

    /// Output values keyed by their dotted state key; unset keys are omitted
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionReport {
    /// Successful run over the given document
    pub fn success(state: &DeploymentState, warnings: Vec<String>) -> Self {
        Self {
            status: STATUS_SUCCESS,
            outputs: outputs(state),
            warnings,
            error: None,
        }
    }

    /// Failed run
    pub fn failure(error: &crate::Error) -> Self {
        Self {
            status: STATUS_FAILURE,
            outputs: Map::new(),
            warnings: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Resolve [`OUTPUT_STATE_KEYS`] against a document
pub fn outputs(state: &DeploymentState) -> Map<String, Value> {
    let document = match serde_json::to_value(state) {
        Ok(document) => document,
        Err(_) => return Map::new(),
    };

    OUTPUT_STATE_KEYS
        .iter()
        .filter_map(|key| {
            let value = key
                .split('.')
                .try_fold(&document, |node, segment| node.get(segment))?;
            (!value.is_null()).then(|| (key.to_string(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outputs_skip_internal_identifiers() {
        let mut state = DeploymentState::default();
        state.domain = Some("example.com".to_string());
        state.aws.cloudfront_distribution_id = Some("E123".to_string());
        state.aws.cloudfront_distribution_url = Some("d1.cloudfront.net".to_string());
        state.aws.route53_hosted_zone_nameservers =
            Some(vec!["ns-1.example".to_string(), "ns-2.example".to_string()]);

        let report = ExecutionReport::success(&state, Vec::new());
        assert!(report.is_success());
        assert_eq!(report.outputs.len(), 3);
        assert_eq!(report.outputs["domain"], "example.com");
        assert_eq!(report.outputs["aws.cloudfrontDistributionUrl"], "d1.cloudfront.net");
        assert_eq!(
            report.outputs["aws.route53HostedZoneNameservers"][1],
            "ns-2.example"
        );
        assert!(!report.outputs.contains_key("aws.s3BucketWebsiteUrl"));
    }

    #[test]
    fn test_failure_report_serialization() {
        let report = ExecutionReport::failure(&crate::Error::config("bad payload"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], 1);
        assert_eq!(json["error"], "Configuration error: bad payload");
        assert!(json.get("outputs").is_none());
        assert!(json.get("warnings").is_none());
    }
}
