//! Contract Test: Teardown
//!
//! Constraints verified:
//! - Resources are removed in reverse dependency order
//! - Resources already deleted out-of-band count as removed
//! - The certificate and hosted zone are left in place
//! - The document is cleared only once every step succeeded
//!
//! If this test fails, removing a deployment can strand resources or state.

mod common;

use common::*;
use site_core::SiteConfig;
use site_core::traits::RecordType;

async fn deployed(harness: &Harness, site: &SiteConfig) {
    harness
        .engine()
        .deploy("marketing", site)
        .await
        .expect("deploy succeeds");
}

#[tokio::test]
async fn remove_deletes_everything_but_certificate_and_zone() {
    let harness = Harness::new();
    deployed(&harness, &SiteConfig::new().with_domain("example.com")).await;
    let state = harness.state().await;
    let zone_id = state.aws.route53_hosted_zone_id.clone().expect("zone recorded");
    let arn = state.aws.acm_certificate_arn.clone().expect("certificate recorded");

    let report = harness
        .engine()
        .remove("marketing")
        .await
        .expect("remove succeeds");

    assert!(report.is_success());
    assert!(report.outputs.is_empty());
    assert!(report.warnings.iter().any(|w| w.contains(&arn)));
    assert!(harness.state().await.is_empty());

    assert!(!harness.cloud.bucket_exists("example.com"));
    assert_eq!(harness.cloud.distribution_count(), 0);
    assert_eq!(harness.cloud.zone_count(), 1);
    assert_eq!(harness.cloud.certificate_count(), 1);

    let remaining: Vec<RecordType> = harness
        .cloud
        .records(&zone_id)
        .into_iter()
        .map(|record| record.record_type)
        .collect();
    assert_eq!(remaining, vec![RecordType::Ns, RecordType::Soa]);
}

#[tokio::test]
async fn remove_runs_in_reverse_dependency_order() {
    let harness = Harness::new();
    deployed(&harness, &SiteConfig::new().with_domain("example.com")).await;
    harness.cloud.reset_calls();

    harness
        .engine()
        .remove("marketing")
        .await
        .expect("remove succeeds");

    let calls = harness.cloud.calls();
    let position = |name: &str| {
        calls
            .iter()
            .position(|call| call == name)
            .unwrap_or_else(|| panic!("{} was not called", name))
    };
    let last_record_change = calls
        .iter()
        .rposition(|call| call == "route53.change_records")
        .expect("records were changed");

    assert!(position("acm.describe") < position("route53.change_records"));
    assert!(last_record_change < position("cloudfront.update"));
    assert!(position("cloudfront.delete") < position("s3.delete_bucket"));
    assert_eq!(harness.cloud.call_count("route53.change_records"), 2);
}

#[tokio::test]
async fn distribution_deleted_out_of_band_is_tolerated() {
    let harness = Harness::new();
    deployed(&harness, &SiteConfig::new().with_bucket_name("oob-site")).await;
    let distribution_id = harness
        .state()
        .await
        .aws
        .cloudfront_distribution_id
        .expect("distribution recorded");
    harness.cloud.remove_distribution_out_of_band(&distribution_id);

    harness
        .engine()
        .remove("marketing")
        .await
        .expect("remove succeeds");

    assert!(harness.state().await.is_empty());
    assert!(!harness.cloud.bucket_exists("oob-site"));
}

#[tokio::test]
async fn bucket_deleted_out_of_band_is_tolerated() {
    let harness = Harness::new();
    deployed(&harness, &SiteConfig::new().with_bucket_name("oob-site")).await;
    harness.cloud.remove_bucket_out_of_band("oob-site");

    harness
        .engine()
        .remove("marketing")
        .await
        .expect("remove succeeds");

    assert!(harness.state().await.is_empty());
    assert_eq!(harness.cloud.distribution_count(), 0);
}

#[tokio::test]
async fn everything_deleted_out_of_band_is_tolerated() {
    let harness = Harness::new();
    deployed(&harness, &SiteConfig::new().with_domain("example.com")).await;
    let state = harness.state().await;
    harness
        .cloud
        .remove_distribution_out_of_band(state.aws.cloudfront_distribution_id.as_deref().unwrap());
    harness.cloud.remove_bucket_out_of_band("example.com");
    harness
        .cloud
        .remove_zone_out_of_band(state.aws.route53_hosted_zone_id.as_deref().unwrap());
    harness
        .cloud
        .remove_certificate_out_of_band(state.aws.acm_certificate_arn.as_deref().unwrap());

    harness
        .engine()
        .remove("marketing")
        .await
        .expect("remove succeeds");

    assert!(harness.state().await.is_empty());
}

#[tokio::test]
async fn remove_waits_for_the_distribution_to_settle() {
    let harness = Harness::new();
    deployed(&harness, &SiteConfig::new().with_bucket_name("slow-site")).await;
    harness.cloud.set_distribution_deploy_lag(3);
    harness.cloud.reset_calls();

    harness
        .engine()
        .remove("marketing")
        .await
        .expect("remove succeeds");

    assert_eq!(harness.cloud.call_count("cloudfront.get"), 4);
    assert_eq!(harness.cloud.distribution_count(), 0);
}

#[tokio::test]
async fn removing_an_empty_deployment_touches_nothing() {
    let harness = Harness::new();

    let report = harness
        .engine()
        .remove("never-deployed")
        .await
        .expect("remove succeeds");

    assert!(report.is_success());
    assert!(harness.cloud.calls().is_empty());
    assert_eq!(harness.store.put_count(), 0);
}

#[tokio::test]
async fn failed_teardown_keeps_remaining_identifiers() {
    let harness = Harness::new();
    deployed(&harness, &SiteConfig::new().with_bucket_name("stuck-site")).await;
    let distribution_id = harness
        .state()
        .await
        .aws
        .cloudfront_distribution_id
        .expect("distribution recorded");

    // The distribution step persists, the bucket step does not
    let interrupting = InterruptingStateStore::new(harness.store.clone(), 1);
    let (engine, _events) =
        engine_with_store(&harness.cloud, Box::new(interrupting), harness.workspace.path());
    engine
        .remove("marketing")
        .await
        .expect_err("simulated crash aborts the teardown");

    let partial = harness.state().await;
    assert!(partial.aws.cloudfront_distribution_id.is_none());
    assert_eq!(partial.aws.s3_bucket_name.as_deref(), Some("stuck-site"));
    assert!(harness.cloud.distribution(&distribution_id).is_none());

    harness
        .engine()
        .remove("marketing")
        .await
        .expect("resumed teardown succeeds");
    assert!(harness.state().await.is_empty());
    assert!(!harness.cloud.bucket_exists("stuck-site"));
}
