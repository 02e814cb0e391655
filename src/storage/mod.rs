//! Object storage (S3-compatible)
//!
//! Handlers only ever talk to [`ObjectStore`]. The R2 implementation wraps
//! `rust-s3`; the in-memory one backs tests and local development.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::config::StorageConfig;

pub mod memory;
pub mod s3_client;

pub use memory::MemoryStore;
pub use s3_client::R2Store;

/// Presigned GET lifetime.
pub const DOWNLOAD_URL_EXPIRY_SECS: u32 = 900;
/// Presigned PUT lifetime.
pub const UPLOAD_URL_EXPIRY_SECS: u32 = 3600;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Timed out connecting to the object store; check network access and credentials")]
    Timeout,

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Access to the object store was denied; check the access key configuration")]
    AccessDenied,

    #[error("Object store is not configured: {0}")]
    Misconfigured(String),

    #[error("{0}")]
    Upstream(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// Classify a raw client failure message.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("timed out") || lower.contains("timeout") || lower.contains("etimedout") {
            StorageError::Timeout
        } else if lower.contains("accessdenied") || lower.contains("access denied") {
            StorageError::AccessDenied
        } else if message.trim().is_empty() {
            StorageError::Upstream("Object store request failed".to_string())
        } else {
            StorageError::Upstream(message.trim().to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    pub objects: Vec<ObjectSummary>,
    pub is_truncated: bool,
}

pub type ByteStream = BoxStream<'static, StorageResult<Bytes>>;

/// Object contents streamed from the store, never buffered whole.
pub struct ObjectBody {
    pub stream: ByteStream,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Metadata stored alongside directly uploaded objects.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub uploader: String,
    pub uploaded_at: DateTime<Utc>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn presign_put(&self, key: &str, expires_in_secs: u32) -> StorageResult<String>;

    /// Presigned GET that forces an attachment download of `filename`.
    async fn presign_get(
        &self,
        key: &str,
        filename: &str,
        expires_in_secs: u32,
    ) -> StorageResult<String>;

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &UploadMetadata,
    ) -> StorageResult<()>;

    async fn get_object(&self, key: &str) -> StorageResult<ObjectBody>;

    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()>;

    async fn list_objects(&self, prefix: &str, max_keys: usize) -> StorageResult<ObjectListing>;

    /// Cheap round-trip used by the health check.
    async fn ping(&self) -> StorageResult<()>;
}

/// Build the configured object store once at startup.
pub fn connect(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.provider.as_str() {
        "memory" => {
            info!(bucket = %config.bucket, "Using in-memory object store");
            Ok(Arc::new(MemoryStore::new(&config.bucket)))
        }
        "r2" | "s3" => {
            let store = R2Store::new(config)?;
            info!(bucket = %config.bucket, endpoint = %config.endpoint, "Connected R2 object store");
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("Unknown STORAGE_PROVIDER: {}", other),
    }
}

/// Last path segment of an object key.
pub fn filename_of(key: &str) -> &str {
    key.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(key)
}

/// `Content-Disposition` forcing a download; the name is percent-encoded so
/// quotes and separators cannot break out of the parameter.
pub fn attachment_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", urlencoding::encode(filename))
}
