//! Remote storage: archives are put into an S3 bucket
//!
//! The driver reads the archive into memory and issues exactly one put per
//! upload. Retrying is left to the caller.

use super::sniff::sniff_content_type;
use super::StorageDriver;
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A single object put
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_length: i64,
    pub content_type: String,
    pub content_disposition: String,
}

/// Object-store seam, so uploads can be recorded in tests
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, request: PutObjectRequest) -> Result<()>;
}

/// aws-sdk-s3 backed store
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client for `region` using the default credential chain
    pub async fn new(region: &str) -> Self {
        let conf = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self {
            client: Client::new(&conf),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        self.client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .body(ByteStream::from(request.body))
            .content_length(request.content_length)
            .content_type(request.content_type)
            .content_disposition(request.content_disposition)
            .send()
            .await
            .with_context(|| format!("Failed to put s3://{}/{}", request.bucket, request.key))?;
        Ok(())
    }
}

pub struct RemoteDriver {
    root: PathBuf,
    bucket: String,
    region: String,
    store: Arc<dyn ObjectStore>,
}

impl RemoteDriver {
    pub fn new(
        root: impl Into<PathBuf>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
            region: region.into(),
            store,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

#[async_trait]
impl StorageDriver for RemoteDriver {
    fn storage_root(&self) -> &Path {
        &self.root
    }

    async fn upload(&self, artifact_name: &str) -> Result<()> {
        let path = self.root.join(artifact_name);
        let body = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read archive {}", path.display()))?;

        let content_length = i64::try_from(body.len()).context("Archive too large")?;
        let content_type = sniff_content_type(&body).to_string();

        info!(
            "Uploading {} ({} bytes, {}) to bucket '{}' in {}",
            artifact_name, content_length, content_type, self.bucket, self.region
        );

        self.store
            .put_object(PutObjectRequest {
                bucket: self.bucket.clone(),
                key: artifact_name.to_string(),
                body,
                content_length,
                content_type,
                content_disposition: "attachment".to_string(),
            })
            .await
    }

    fn retains_archives(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// A put as seen by the store, body reduced to its length
    #[derive(Clone, Debug)]
    pub struct RecordedPut {
        pub bucket: String,
        pub key: String,
        pub body_len: usize,
        pub content_length: i64,
        pub content_type: String,
        pub content_disposition: String,
    }

    #[derive(Clone, Default)]
    pub struct MockObjectStore {
        pub puts: Arc<Mutex<Vec<RecordedPut>>>,
        pub should_fail: Arc<Mutex<bool>>,
    }

    impl MockObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure puts to fail
        pub fn with_failing_put(self) -> Self {
            *self.should_fail.lock().unwrap() = true;
            self
        }

        pub fn get_puts(&self) -> Vec<RecordedPut> {
            self.puts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStore for MockObjectStore {
        async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
            self.puts.lock().unwrap().push(RecordedPut {
                bucket: request.bucket,
                key: request.key,
                body_len: request.body.len(),
                content_length: request.content_length,
                content_type: request.content_type,
                content_disposition: request.content_disposition,
            });
            if *self.should_fail.lock().unwrap() {
                anyhow::bail!("Mock put failure");
            }
            Ok(())
        }
    }
}
