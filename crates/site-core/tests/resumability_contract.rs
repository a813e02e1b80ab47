//! Contract Test: Resumable Deploys
//!
//! Constraints verified:
//! - Every completed step is persisted before the next one starts
//! - A run interrupted after a persisted step resumes at the next step
//! - Completed steps are not repeated, their resources are not recreated
//!
//! If this test fails, a crash mid-deploy orphans or duplicates resources.

mod common;

use common::*;
use site_core::{Error, SiteConfig};

#[tokio::test]
async fn crash_after_bucket_step_resumes_at_hosting() {
    let harness = Harness::new();
    let site = SiteConfig::new().with_bucket_name("resumable-site");

    // Region and bucket name are persisted, the hosting flag is not
    let interrupting = InterruptingStateStore::new(harness.store.clone(), 2);
    let (engine, _events) =
        engine_with_store(&harness.cloud, Box::new(interrupting), harness.workspace.path());
    let err = engine
        .deploy("resumable", &site)
        .await
        .expect_err("simulated crash aborts the run");
    assert!(matches!(err, Error::StateStore(_)));

    let partial = harness.state().await;
    assert_eq!(partial.aws.s3_bucket_name.as_deref(), Some("resumable-site"));
    assert!(!partial.aws.hosting_configured());
    assert!(partial.aws.cloudfront_distribution_id.is_none());

    harness.cloud.reset_calls();
    harness
        .engine()
        .deploy("resumable", &site)
        .await
        .expect("resumed deploy succeeds");

    assert_eq!(harness.cloud.call_count("s3.create_bucket"), 0);
    // The website configuration written before the crash already matches
    assert_eq!(harness.cloud.call_count("s3.put_website_config"), 0);
    assert_eq!(harness.cloud.call_count("cloudfront.create"), 1);
    assert_eq!(harness.cloud.bucket_count(), 1);
    assert!(harness.state().await.aws.hosting_configured());
}

#[tokio::test]
async fn crash_after_hosted_zone_step_reuses_zone_and_certificate() {
    let harness = Harness::new();
    let site = SiteConfig::new().with_domain("example.com");

    // region, bucket, hosting, distribution, domain, hosted zone
    let interrupting = InterruptingStateStore::new(harness.store.clone(), 6);
    let (engine, _events) =
        engine_with_store(&harness.cloud, Box::new(interrupting), harness.workspace.path());
    engine
        .deploy("marketing", &site)
        .await
        .expect_err("simulated crash aborts the run");

    let partial = harness.state().await;
    assert!(partial.aws.route53_hosted_zone_id.is_some());
    assert!(partial.aws.acm_certificate_arn.is_none());
    assert_eq!(harness.cloud.call_count("acm.request"), 1);

    harness.cloud.reset_calls();
    harness
        .engine()
        .deploy("marketing", &site)
        .await
        .expect("resumed deploy succeeds");

    for call in ["s3.create_bucket", "cloudfront.create", "route53.create_zone", "acm.request"] {
        assert_eq!(harness.cloud.call_count(call), 0, "{} was repeated", call);
    }
    assert_eq!(harness.cloud.call_count("cloudfront.update"), 1);
    assert_eq!(harness.cloud.zone_count(), 1);
    assert_eq!(harness.cloud.certificate_count(), 1);
    assert!(harness.state().await.aws.acm_certificate_arn.is_some());
}

#[tokio::test]
async fn adding_a_domain_later_only_runs_domain_steps() {
    let harness = Harness::new();
    harness
        .engine()
        .deploy("marketing", &SiteConfig::new().with_bucket_name("example-site"))
        .await
        .expect("deploy without domain succeeds");
    harness.cloud.reset_calls();

    harness
        .engine()
        .deploy(
            "marketing",
            &SiteConfig::new()
                .with_bucket_name("example-site")
                .with_domain("example.com"),
        )
        .await
        .expect("deploy with domain succeeds");

    assert_eq!(harness.cloud.call_count("s3.create_bucket"), 0);
    assert_eq!(harness.cloud.call_count("s3.put_website_config"), 0);
    assert_eq!(harness.cloud.call_count("cloudfront.create"), 0);
    assert_eq!(harness.cloud.call_count("route53.create_zone"), 1);
    assert_eq!(harness.cloud.call_count("acm.request"), 1);
    assert_eq!(harness.cloud.call_count("cloudfront.update"), 1);
}

#[tokio::test]
async fn every_step_is_persisted_individually() {
    let harness = Harness::new();
    harness
        .engine()
        .deploy("marketing", &SiteConfig::new().with_domain("example.com"))
        .await
        .expect("deploy succeeds");

    // region, bucket, hosting, distribution, domain, hosted zone, certificate
    assert_eq!(harness.store.put_count(), 7);
}
