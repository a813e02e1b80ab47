//! Contract Test: Idempotent Deploys
//!
//! Constraints verified:
//! - A second deploy with identical configuration sends no hosting or
//!   distribution configuration calls
//! - Nothing is created twice
//! - The deployment document is not rewritten when nothing changed
//!
//! If this test fails, every deploy pays the distribution propagation delay.

mod common;

use common::*;
use site_core::SiteConfig;

const CONFIGURATION_CALLS: &[&str] = &[
    "s3.create_bucket",
    "s3.put_public_access_block",
    "s3.put_policy",
    "s3.put_cors",
    "s3.put_website_config",
    "cloudfront.create",
    "cloudfront.update",
    "route53.create_zone",
    "acm.request",
];

#[tokio::test]
async fn second_deploy_with_domain_short_circuits() {
    let harness = Harness::new();
    let site = SiteConfig::new().with_domain("example.com");

    let first = harness
        .engine()
        .deploy("marketing", &site)
        .await
        .expect("first deploy succeeds");
    assert!(first.is_success());
    assert!(first.warnings.is_empty(), "warnings: {:?}", first.warnings);
    assert_eq!(harness.cloud.call_count("cloudfront.update"), 1);

    let state_after_first = harness.state().await;
    let puts_after_first = harness.store.put_count();
    harness.cloud.reset_calls();

    let second = harness
        .engine()
        .deploy("marketing", &site)
        .await
        .expect("second deploy succeeds");

    for call in CONFIGURATION_CALLS {
        assert_eq!(harness.cloud.call_count(call), 0, "{} was called again", call);
    }
    assert_eq!(harness.store.put_count(), puts_after_first);
    assert_eq!(harness.state().await, state_after_first);
    assert_eq!(second.outputs, first.outputs);
}

#[tokio::test]
async fn second_deploy_without_domain_short_circuits() {
    let harness = Harness::new();
    let site = SiteConfig::new().with_bucket_name("plain-site");

    harness
        .engine()
        .deploy("plain", &site)
        .await
        .expect("first deploy succeeds");
    harness.cloud.reset_calls();

    harness
        .engine()
        .deploy("plain", &site)
        .await
        .expect("second deploy succeeds");

    for call in CONFIGURATION_CALLS {
        assert_eq!(harness.cloud.call_count(call), 0, "{} was called again", call);
    }
    // Content is re-uploaded and the cache invalidated on every run
    assert_eq!(harness.cloud.call_count("s3.put_object"), 1);
    assert_eq!(harness.cloud.call_count("cloudfront.invalidate"), 1);
}

#[tokio::test]
async fn first_deploy_reports_curated_outputs() {
    let harness = Harness::new();

    let report = harness
        .engine()
        .deploy("marketing", &SiteConfig::new().with_domain("example.com"))
        .await
        .expect("deploy succeeds");

    let state = harness.state().await;
    assert_eq!(report.outputs["domain"], "example.com");
    assert_eq!(
        report.outputs["aws.s3BucketWebsiteUrl"],
        "example.com.s3-website-us-east-1.amazonaws.com"
    );
    assert_eq!(
        report.outputs["aws.cloudfrontDistributionUrl"].as_str(),
        state.aws.cloudfront_distribution_url.as_deref()
    );
    assert_eq!(
        report.outputs["aws.route53HostedZoneNameservers"]
            .as_array()
            .map(Vec::len),
        Some(4)
    );
    assert!(!report.outputs.contains_key("aws.cloudfrontDistributionId"));

    let distribution_id = state.aws.cloudfront_distribution_id.expect("distribution recorded");
    let distribution = harness
        .cloud
        .distribution(&distribution_id)
        .expect("distribution exists");
    assert!(distribution.config.enabled);
    assert_eq!(distribution.config.aliases, vec!["example.com".to_string()]);
    assert_eq!(
        distribution.config.viewer_certificate.certificate_arn(),
        state.aws.acm_certificate_arn.as_deref()
    );
}
