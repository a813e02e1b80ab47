//! Contract Test: Drift Detection
//!
//! Constraints verified:
//! - A recorded resource that no longer exists fails the deploy loudly
//! - The missing resource is never silently recreated
//! - A bucket name owned by someone else is reported as taken
//! - A recorded distribution with a lost domain name is recovered, not replaced

mod common;

use common::*;
use site_core::traits::StateStore;
use site_core::{Error, SiteConfig};

async fn deployed_with_domain() -> Harness {
    let harness = Harness::new();
    harness
        .engine()
        .deploy("marketing", &SiteConfig::new().with_domain("example.com"))
        .await
        .expect("deploy succeeds");
    harness.cloud.reset_calls();
    harness
}

async fn redeploy(harness: &Harness) -> Error {
    harness
        .engine()
        .deploy("marketing", &SiteConfig::new().with_domain("example.com"))
        .await
        .expect_err("drift fails the deploy")
}

#[tokio::test]
async fn missing_bucket_is_drift() {
    let harness = deployed_with_domain().await;
    harness.cloud.remove_bucket_out_of_band("example.com");

    let err = redeploy(&harness).await;

    assert!(matches!(err, Error::Drift { resource: "bucket", .. }), "{:?}", err);
    assert_eq!(harness.cloud.call_count("s3.create_bucket"), 0);
    assert!(!harness.cloud.bucket_exists("example.com"));
}

#[tokio::test]
async fn missing_distribution_is_drift() {
    let harness = deployed_with_domain().await;
    let state = harness.state().await;
    harness
        .cloud
        .remove_distribution_out_of_band(state.aws.cloudfront_distribution_id.as_deref().unwrap());

    let err = redeploy(&harness).await;

    assert!(matches!(err, Error::Drift { resource: "distribution", .. }), "{:?}", err);
    assert_eq!(harness.cloud.call_count("cloudfront.create"), 0);
    assert_eq!(harness.state().await, state);
}

#[tokio::test]
async fn missing_hosted_zone_is_drift() {
    let harness = deployed_with_domain().await;
    let state = harness.state().await;
    harness
        .cloud
        .remove_zone_out_of_band(state.aws.route53_hosted_zone_id.as_deref().unwrap());

    let err = redeploy(&harness).await;

    assert!(matches!(err, Error::Drift { resource: "hosted zone", .. }), "{:?}", err);
    assert_eq!(harness.cloud.call_count("route53.create_zone"), 0);
}

#[tokio::test]
async fn missing_certificate_is_drift() {
    let harness = deployed_with_domain().await;
    let state = harness.state().await;
    harness
        .cloud
        .remove_certificate_out_of_band(state.aws.acm_certificate_arn.as_deref().unwrap());

    let err = redeploy(&harness).await;

    assert!(matches!(err, Error::Drift { resource: "certificate", .. }), "{:?}", err);
    assert_eq!(harness.cloud.call_count("acm.request"), 0);
}

#[tokio::test]
async fn foreign_bucket_name_is_taken() {
    let harness = Harness::new();
    harness.cloud.claim_foreign_bucket("popular-name");

    let err = harness
        .engine()
        .deploy("marketing", &SiteConfig::new().with_bucket_name("popular-name"))
        .await
        .expect_err("taken bucket name fails the deploy");

    assert!(matches!(err, Error::BucketNameTaken { .. }), "{:?}", err);
    assert_eq!(harness.cloud.call_count("s3.create_bucket"), 0);
    // Only the region was recorded
    assert!(harness.state().await.aws.s3_bucket_name.is_none());
}

#[tokio::test]
async fn lost_distribution_url_is_recovered_from_the_recorded_id() {
    let harness = deployed_with_domain().await;
    let deployed = harness.state().await;
    let mut damaged = deployed.clone();
    damaged.aws.cloudfront_distribution_url = None;
    harness.store.put(&damaged).await.expect("write state");

    harness
        .engine()
        .deploy("marketing", &SiteConfig::new().with_domain("example.com"))
        .await
        .expect("deploy succeeds");

    let state = harness.state().await;
    assert_eq!(harness.cloud.call_count("cloudfront.create"), 0);
    assert_eq!(harness.cloud.distribution_count(), 1);
    assert_eq!(
        state.aws.cloudfront_distribution_id,
        deployed.aws.cloudfront_distribution_id
    );
    assert_eq!(
        state.aws.cloudfront_distribution_url,
        deployed.aws.cloudfront_distribution_url
    );
}
