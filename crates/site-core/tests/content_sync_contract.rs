//! Contract Test: Content Sync
//!
//! Constraints verified:
//! - Without a content path exactly one placeholder page is uploaded
//! - With a content path of K files exactly K objects are uploaded, keyed by
//!   their `/`-separated path relative to the content root
//! - Content types follow file extensions
//! - A missing content path fails before any resource call

mod common;

use common::*;
use site_core::{Error, SiteConfig};

#[tokio::test]
async fn placeholder_is_uploaded_without_content_path() {
    let harness = Harness::new();

    harness
        .engine()
        .deploy("placeholder", &SiteConfig::new().with_bucket_name("placeholder-site"))
        .await
        .expect("deploy succeeds");

    assert_eq!(harness.cloud.call_count("s3.put_object"), 1);
    assert_eq!(
        harness.cloud.object_keys("placeholder-site"),
        vec!["index.html".to_string()]
    );
    let page = harness
        .cloud
        .object("placeholder-site", "index.html")
        .expect("placeholder uploaded");
    assert_eq!(page.content_type, "text/html");
    assert!(String::from_utf8_lossy(&page.body).contains("<html"));
}

#[tokio::test]
async fn content_tree_is_uploaded_with_relative_keys() {
    let harness = Harness::new();
    harness.write_site(
        "dist",
        &[
            ("index.html", "<html><body>home</body></html>"),
            ("css/site.css", "body { margin: 0 }"),
            ("img/logo.png", "not really a png"),
            ("docs/guide/intro.txt", "hello"),
        ],
    );

    harness
        .engine()
        .deploy(
            "content",
            &SiteConfig::new()
                .with_bucket_name("content-site")
                .with_src("dist"),
        )
        .await
        .expect("deploy succeeds");

    assert_eq!(harness.cloud.call_count("s3.put_object"), 4);
    assert_eq!(
        harness.cloud.object_keys("content-site"),
        vec![
            "css/site.css".to_string(),
            "docs/guide/intro.txt".to_string(),
            "img/logo.png".to_string(),
            "index.html".to_string(),
        ]
    );

    let content_type = |key: &str| {
        harness
            .cloud
            .object("content-site", key)
            .map(|object| object.content_type)
            .unwrap_or_default()
    };
    assert_eq!(content_type("index.html"), "text/html");
    assert_eq!(content_type("css/site.css"), "text/css");
    assert_eq!(content_type("img/logo.png"), "image/png");
    assert_eq!(content_type("docs/guide/intro.txt"), "text/plain");
}

#[tokio::test]
async fn leading_slash_is_relative_to_workspace_root() {
    let harness = Harness::new();
    harness.write_site("public", &[("index.html", "<html></html>")]);

    harness
        .engine()
        .deploy(
            "content",
            &SiteConfig::new()
                .with_bucket_name("slash-site")
                .with_src("/public"),
        )
        .await
        .expect("deploy succeeds");

    assert_eq!(
        harness.cloud.object_keys("slash-site"),
        vec!["index.html".to_string()]
    );
}

#[tokio::test]
async fn missing_content_path_fails_before_any_call() {
    let harness = Harness::new();

    let err = harness
        .engine()
        .deploy(
            "content",
            &SiteConfig::new()
                .with_bucket_name("missing-site")
                .with_src("does-not-exist"),
        )
        .await
        .expect_err("missing path is rejected");

    assert!(matches!(err, Error::MissingPath { .. }));
    assert!(err.is_validation());
    assert!(harness.cloud.calls().is_empty());
    assert_eq!(harness.store.put_count(), 0);
}

#[tokio::test]
async fn hosting_and_upload_survive_bucket_visibility_lag() {
    let harness = Harness::new();
    harness.cloud.set_bucket_visibility_lag(3);

    harness
        .engine()
        .deploy("lagging", &SiteConfig::new().with_bucket_name("lagging-site"))
        .await
        .expect("deploy succeeds");

    assert_eq!(harness.cloud.call_count("s3.head_bucket"), 5);
    assert_eq!(harness.cloud.call_count("s3.create_bucket"), 1);
    assert!(harness.cloud.bucket_is_public("lagging-site"));
    assert!(harness.cloud.website_config("lagging-site").is_some());
}
