// In-memory object store

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{
    ObjectBody, ObjectListing, ObjectStore, ObjectSummary, StorageError, StorageResult,
    UploadMetadata,
};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: String,
    summary: ObjectSummary,
    uploader: Option<String>,
}

/// Bucket held in a sorted map so listings come back in key order.
pub struct MemoryStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: RwLock::new(BTreeMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// While offline every call fails the way an unreachable endpoint does.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::Timeout)
        } else {
            Ok(())
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn uploader_of(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .and_then(|o| o.uploader.clone())
    }

    fn presigned(&self, method: &str, key: &str, expires_in_secs: u32) -> String {
        format!(
            "memory://{}/{}?X-Amz-Method={}&X-Amz-Expires={}",
            self.bucket,
            urlencoding::encode(key),
            method,
            expires_in_secs
        )
    }

    async fn insert(&self, key: &str, body: Bytes, content_type: &str, uploader: Option<String>) {
        let summary = ObjectSummary {
            key: key.to_string(),
            size: body.len() as u64,
            last_modified: Some(Utc::now()),
            etag: Some(format!("\"{:x}\"", body.len())),
        };
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                summary,
                uploader,
            },
        );
    }

    /// Seed an object without going through an upload route.
    pub async fn seed(&self, key: &str, body: &[u8], content_type: &str) {
        self.insert(key, Bytes::copy_from_slice(body), content_type, None)
            .await;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn presign_put(&self, key: &str, expires_in_secs: u32) -> StorageResult<String> {
        self.check_online()?;
        Ok(self.presigned("PUT", key, expires_in_secs))
    }

    async fn presign_get(
        &self,
        key: &str,
        _filename: &str,
        expires_in_secs: u32,
    ) -> StorageResult<String> {
        self.check_online()?;
        Ok(self.presigned("GET", key, expires_in_secs))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &UploadMetadata,
    ) -> StorageResult<()> {
        self.check_online()?;
        self.insert(key, body, content_type, Some(metadata.uploader.clone()))
            .await;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> StorageResult<ObjectBody> {
        self.check_online()?;
        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let body = object.body.clone();
        Ok(ObjectBody {
            content_length: Some(body.len() as u64),
            content_type: Some(object.content_type.clone()),
            stream: stream::once(async move { Ok::<_, StorageError>(body) }).boxed(),
        })
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.check_online()?;
        // S3 deletes are idempotent
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()> {
        self.check_online()?;
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list_objects(&self, prefix: &str, max_keys: usize) -> StorageResult<ObjectListing> {
        self.check_online()?;
        let objects = self.objects.read().await;
        let mut matching = objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, object)| object.summary.clone());

        let page: Vec<ObjectSummary> = matching.by_ref().take(max_keys).collect();
        let is_truncated = matching.next().is_some();

        Ok(ObjectListing {
            objects: page,
            is_truncated,
        })
    }

    async fn ping(&self) -> StorageResult<()> {
        self.check_online()
    }
}
