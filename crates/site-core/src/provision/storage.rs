//! Object-storage provisioning
//!
//! Bucket lifecycle, website hosting configuration and content upload.

use std::path::{Path, PathBuf};

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::EngineConfig;
use crate::error::{Error, ErrorCode};
use crate::retry::{RetryPolicy, retry};
use crate::traits::object_storage::{
    CorsRule, ObjectStorage, PublicAccessBlock, PutObjectRequest, WebsiteConfiguration,
};
use crate::Result;

/// Key and content type of the page uploaded when no content directory is set
const PLACEHOLDER_KEY: &str = "index.html";
const PLACEHOLDER_CONTENT_TYPE: &str = "text/html";
const PLACEHOLDER_BODY: &str = "<!DOCTYPE html>
<html>
  <head><meta charset=\"utf-8\"><title>Welcome</title></head>
  <body><h1>Welcome to the Website Extension.</h1></body>
</html>
";

/// Maximum keys per delete request
const DELETE_BATCH_SIZE: usize = 1000;

/// What [`find_or_create_bucket`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketOutcome {
    Existing,
    Created,
}

/// What [`configure_for_hosting`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostingOutcome {
    /// The website configuration already matched
    AlreadyConfigured,
    /// Access block, policy, CORS and website configuration were written
    Configured,
}

/// What [`empty_and_delete_bucket`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketRemoval {
    Deleted { objects: usize },
    AlreadyAbsent,
}

fn is_missing_bucket(e: &Error) -> bool {
    e.is_code(&ErrorCode::NotFound) || e.is_code(&ErrorCode::NoSuchBucket)
}

/// Ensure `bucket` exists
///
/// When `recorded` is true the bucket is known from state; a missing bucket
/// is then drift and is never re-created. Otherwise a missing bucket is
/// created and polled until it becomes visible.
pub async fn find_or_create_bucket(
    storage: &dyn ObjectStorage,
    bucket: &str,
    recorded: bool,
    config: &EngineConfig,
) -> Result<BucketOutcome> {
    match storage.head_bucket(bucket).await {
        Ok(()) => {
            debug!("Bucket {} exists", bucket);
            Ok(BucketOutcome::Existing)
        }
        Err(e) if e.is_code(&ErrorCode::Forbidden) => Err(Error::BucketNameTaken {
            bucket: bucket.to_string(),
        }),
        Err(e) if is_missing_bucket(&e) => {
            if recorded {
                return Err(Error::drift("bucket", bucket));
            }

            storage.create_bucket(bucket).await?;
            info!("Created bucket {}", bucket);

            let policy = RetryPolicy::fixed(config.bucket_poll_attempts, config.bucket_poll_delay());
            retry(&policy, "bucket existence check", is_missing_bucket, || {
                storage.head_bucket(bucket)
            })
            .await?;
            Ok(BucketOutcome::Created)
        }
        Err(e) => Err(e),
    }
}

/// Website endpoint of a bucket
pub fn website_endpoint(bucket: &str, region: &str) -> String {
    format!("{}.s3-website-{}.amazonaws.com", bucket, region)
}

/// Public-read policy for every object of `bucket`
pub fn public_read_policy(bucket: &str) -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "PublicReadGetObject",
            "Effect": "Allow",
            "Principal": "*",
            "Action": ["s3:GetObject"],
            "Resource": [format!("arn:aws:s3:::{}/*", bucket)],
        }],
    })
    .to_string()
}

/// CORS rules of a hosted site
pub fn website_cors_rules() -> Vec<CorsRule> {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        CorsRule {
            allowed_methods: strings(&["PUT", "POST", "DELETE", "HEAD"]),
            allowed_origins: strings(&["https://*.amazonaws.com"]),
            allowed_headers: strings(&["*"]),
            max_age_seconds: 0,
        },
        CorsRule {
            allowed_methods: strings(&["GET"]),
            allowed_origins: strings(&["*"]),
            allowed_headers: strings(&["*"]),
            max_age_seconds: 0,
        },
    ]
}

/// Configure `bucket` for public static-site hosting
///
/// Short-circuits when the website configuration already matches. A bucket
/// that is not visible yet is retried after `hosting_retry_delay`.
pub async fn configure_for_hosting(
    storage: &dyn ObjectStorage,
    bucket: &str,
    index_document: &str,
    error_document: &str,
    config: &EngineConfig,
) -> Result<HostingOutcome> {
    let desired = WebsiteConfiguration {
        index_document: index_document.to_string(),
        error_document: error_document.to_string(),
    };
    let policy = RetryPolicy::fixed(config.hosting_attempts, config.hosting_retry_delay());

    retry(
        &policy,
        "hosting configuration",
        |e| e.is_code(&ErrorCode::NoSuchBucket),
        || apply_hosting(storage, bucket, &desired),
    )
    .await
}

async fn apply_hosting(
    storage: &dyn ObjectStorage,
    bucket: &str,
    desired: &WebsiteConfiguration,
) -> Result<HostingOutcome> {
    match storage.get_website_config(bucket).await {
        Ok(current) if &current == desired => {
            debug!("Bucket {} already configured for hosting", bucket);
            return Ok(HostingOutcome::AlreadyConfigured);
        }
        Ok(_) => {}
        Err(e) if e.is_code(&ErrorCode::NoSuchWebsiteConfiguration) => {}
        Err(e) => return Err(e),
    }

    storage
        .put_public_access_block(bucket, &PublicAccessBlock::default())
        .await?;
    storage.put_policy(bucket, &public_read_policy(bucket)).await?;
    storage.put_cors(bucket, &website_cors_rules()).await?;
    storage.put_website_config(bucket, desired).await?;

    info!("Configured bucket {} for website hosting", bucket);
    Ok(HostingOutcome::Configured)
}

/// Object key of `path` relative to `root`, `/`-separated
pub fn object_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().replace('\\', "/"))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn collect_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            Error::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(key) = object_key(root, entry.path()) {
            files.push((key, entry.into_path()));
        }
    }
    Ok(files)
}

/// Upload the content tree of `src` into `bucket`
///
/// With no `src`, a single placeholder page is uploaded. Uploads run
/// concurrently; the first failure aborts the sync.
///
/// # Returns
///
/// Number of objects uploaded.
pub async fn sync_content(
    storage: &dyn ObjectStorage,
    bucket: &str,
    src: Option<&Path>,
    config: &EngineConfig,
) -> Result<usize> {
    let Some(root) = src else {
        storage
            .put_object(PutObjectRequest {
                bucket: bucket.to_string(),
                key: PLACEHOLDER_KEY.to_string(),
                body: PLACEHOLDER_BODY.as_bytes().to_vec(),
                content_type: PLACEHOLDER_CONTENT_TYPE.to_string(),
            })
            .await?;
        info!("Uploaded placeholder page to {}", bucket);
        return Ok(1);
    };

    let root = root.to_path_buf();
    let files = tokio::task::spawn_blocking(move || collect_files(&root))
        .await
        .map_err(|e| Error::Other(format!("Content scan task failed: {}", e)))??;
    let count = files.len();
    debug!("Uploading {} files to {}", count, bucket);

    stream::iter(files)
        .map(Ok::<_, Error>)
        .try_for_each_concurrent(config.upload_concurrency, |(key, path)| async move {
            let body = tokio::fs::read(&path).await?;
            let content_type = mime_guess::from_path(&path)
                .first_or_octet_stream()
                .essence_str()
                .to_string();
            storage
                .put_object(PutObjectRequest {
                    bucket: bucket.to_string(),
                    key,
                    body,
                    content_type,
                })
                .await
        })
        .await?;

    info!("Uploaded {} files to {}", count, bucket);
    Ok(count)
}

/// Delete every object of `bucket`, then the bucket
///
/// A bucket that is already gone counts as removed.
pub async fn empty_and_delete_bucket(
    storage: &dyn ObjectStorage,
    bucket: &str,
) -> Result<BucketRemoval> {
    match delete_bucket_contents(storage, bucket).await {
        Ok(objects) => {
            info!("Deleted bucket {} ({} objects)", bucket, objects);
            Ok(BucketRemoval::Deleted { objects })
        }
        Err(e) if e.is_code(&ErrorCode::NoSuchBucket) => {
            debug!("Bucket {} already absent", bucket);
            Ok(BucketRemoval::AlreadyAbsent)
        }
        Err(e) => Err(e),
    }
}

async fn delete_bucket_contents(storage: &dyn ObjectStorage, bucket: &str) -> Result<usize> {
    let mut keys = Vec::new();
    let mut continuation: Option<String> = None;
    loop {
        let page = storage.list_objects(bucket, continuation.as_deref()).await?;
        keys.extend(page.keys);
        match page.next_token {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    for batch in keys.chunks(DELETE_BATCH_SIZE) {
        storage.delete_objects(bucket, batch).await?;
    }
    storage.delete_bucket(bucket).await?;
    Ok(keys.len())
}
