//! S3-backed [`ObjectStore`], enabled with the `s3` feature.
//!
//! Credentials and region come from the default AWS provider chain. The
//! blocking [`ObjectStore`] methods drive the async SDK on a private runtime
//! so the store can be shared across sync worker threads.

use std::io::Write;

use aws_sdk_s3::Client;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::store::{ListPage, ObjectStore, StoreError};

/// A bucket, optionally rooted at a key prefix, addressed as `s3://bucket[/prefix]`.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    root: String,
    runtime: Runtime,
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

/// Splits `s3://bucket/prefix` into `(bucket, prefix)`; the prefix has no
/// surrounding slashes and may be empty.
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] for anything that is not an `s3://` URL
/// with a bucket name.
pub fn parse_s3_url(url: &str) -> Result<(String, String), StoreError> {
    let rest = url
        .strip_prefix("s3://")
        .ok_or_else(|| StoreError::InvalidKey(format!("not an s3 url: {url}")))?;
    let rest = rest.trim().trim_matches('/');
    let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(StoreError::InvalidKey(format!("missing bucket in {url}")));
    }
    Ok((bucket.to_string(), prefix.trim_matches('/').to_string()))
}

impl S3ObjectStore {
    /// Connects to the bucket named by an `s3://bucket[/prefix]` URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the URL is invalid or the runtime cannot start.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let (bucket, root) = parse_s3_url(url)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Backend(format!("tokio runtime init failed: {e}")))?;
        let config = runtime.block_on(aws_config::load_defaults(
            aws_config::BehaviorVersion::latest(),
        ));
        let client = Client::new(&config);
        debug!(%bucket, %root, "connected to s3 bucket");
        Ok(Self {
            client,
            bucket,
            root,
            runtime,
        })
    }

    fn full_key(&self, key: &str) -> String {
        if self.root.is_empty() {
            key.to_string()
        } else {
            format!("{}/{key}", self.root)
        }
    }

    fn relative_key(&self, full: &str) -> Option<String> {
        if self.root.is_empty() {
            return Some(full.to_string());
        }
        full.strip_prefix(&self.root)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }
}

impl ObjectStore for S3ObjectStore {
    fn list_page(&self, prefix: &str, continuation: Option<&str>) -> Result<ListPage, StoreError> {
        let resp = self.runtime.block_on(async {
            self.client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(self.full_key(prefix))
                .set_continuation_token(continuation.map(str::to_string))
                .send()
                .await
                .map_err(|e| StoreError::Backend(format!("list_objects_v2 failed: {e:?}")))
        })?;

        let keys = resp
            .contents
            .unwrap_or_default()
            .into_iter()
            .filter_map(|object| object.key)
            .filter(|key| !key.ends_with('/'))
            .filter_map(|key| self.relative_key(&key))
            .collect();
        let continuation = if resp.is_truncated.unwrap_or(false) {
            resp.next_continuation_token
        } else {
            None
        };
        Ok(ListPage { keys, continuation })
    }

    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<u64, StoreError> {
        let full = self.full_key(key);
        self.runtime.block_on(async {
            let object = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&full)
                .send()
                .await
                .map_err(|e| {
                    if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                        StoreError::NotFound(key.to_string())
                    } else {
                        StoreError::Backend(format!("get_object {key} failed: {e:?}"))
                    }
                })?;

            let mut body = object.body;
            let mut written = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk
                    .map_err(|e| StoreError::Backend(format!("reading {key} failed: {e}")))?;
                sink.write_all(&chunk).map_err(|source| StoreError::Io {
                    key: key.to_string(),
                    source,
                })?;
                written += chunk.len() as u64;
            }
            Ok(written)
        })
    }
}
