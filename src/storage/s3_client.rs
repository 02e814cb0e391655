// R2 client over rust-s3

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use futures::{StreamExt, TryStreamExt};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    attachment_disposition, ObjectBody, ObjectListing, ObjectStore, ObjectSummary, StorageError,
    StorageResult, UploadMetadata,
};
use crate::config::StorageConfig;

pub struct R2Store {
    bucket: Bucket,
    bucket_name: String,
}

impl R2Store {
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Misconfigured(e.to_string()))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Misconfigured(e.to_string()))?
            .with_path_style();
        bucket.set_request_timeout(Some(Duration::from_secs(config.request_timeout_secs)));

        Ok(Self {
            bucket,
            bucket_name: config.bucket.clone(),
        })
    }

    fn check_status(key: &str, status: u16) -> StorageResult<()> {
        match status {
            200..=299 => Ok(()),
            404 => Err(StorageError::NotFound(key.to_string())),
            403 => Err(StorageError::AccessDenied),
            other => Err(StorageError::Upstream(format!(
                "Object store returned HTTP {}",
                other
            ))),
        }
    }
}

fn translate(key: &str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(404, _) => StorageError::NotFound(key.to_string()),
        S3Error::HttpFailWithBody(403, _) => StorageError::AccessDenied,
        other => StorageError::from_message(other.to_string()),
    }
}

fn parse_last_modified(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl ObjectStore for R2Store {
    fn bucket(&self) -> &str {
        &self.bucket_name
    }

    async fn presign_put(&self, key: &str, expires_in_secs: u32) -> StorageResult<String> {
        self.bucket
            .presign_put(key, expires_in_secs, None)
            .await
            .map_err(|e| translate(key, e))
    }

    async fn presign_get(
        &self,
        key: &str,
        filename: &str,
        expires_in_secs: u32,
    ) -> StorageResult<String> {
        let mut queries = HashMap::new();
        queries.insert(
            "response-content-disposition".to_string(),
            attachment_disposition(filename),
        );

        self.bucket
            .presign_get(key, expires_in_secs, Some(queries))
            .await
            .map_err(|e| translate(key, e))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
        metadata: &UploadMetadata,
    ) -> StorageResult<()> {
        let mut bucket = self.bucket.clone();
        bucket.add_header("x-amz-meta-uploader", &metadata.uploader);
        bucket.add_header("x-amz-meta-uploaded-at", &metadata.uploaded_at.to_rfc3339());

        let response = bucket
            .put_object_with_content_type(key, &body, content_type)
            .await
            .map_err(|e| translate(key, e))?;
        Self::check_status(key, response.status_code())?;

        info!(key, size = body.len(), "Stored object");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> StorageResult<ObjectBody> {
        // The streaming GET carries no headers, so size and type come from HEAD
        let (head, status) = self
            .bucket
            .head_object(key)
            .await
            .map_err(|e| translate(key, e))?;
        Self::check_status(key, status)?;

        let response = self
            .bucket
            .get_object_stream(key)
            .await
            .map_err(|e| translate(key, e))?;
        Self::check_status(key, response.status_code)?;

        let stream_key = key.to_string();
        let stream = response
            .bytes
            .map_err(move |e| translate(&stream_key, e))
            .boxed();

        Ok(ObjectBody {
            stream,
            content_type: head.content_type,
            content_length: head.content_length.and_then(|n| u64::try_from(n).ok()),
        })
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        let response = self
            .bucket
            .delete_object(key)
            .await
            .map_err(|e| translate(key, e))?;

        // 404 on delete means it is already gone
        match Self::check_status(key, response.status_code()) {
            Err(StorageError::NotFound(_)) | Ok(()) => {
                debug!(key, "Deleted object");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()> {
        try_join_all(keys.iter().map(|key| self.delete_object(key))).await?;
        Ok(())
    }

    async fn list_objects(&self, prefix: &str, max_keys: usize) -> StorageResult<ObjectListing> {
        let (page, status) = self
            .bucket
            .list_page(prefix.to_string(), None, None, None, Some(max_keys))
            .await
            .map_err(|e| translate(prefix, e))?;
        Self::check_status(prefix, status)?;

        let objects = page
            .contents
            .into_iter()
            .filter(|object| !object.key.is_empty())
            .map(|object| ObjectSummary {
                last_modified: parse_last_modified(&object.last_modified),
                key: object.key,
                size: object.size,
                etag: object.e_tag,
            })
            .collect();

        Ok(ObjectListing {
            objects,
            is_truncated: page.is_truncated,
        })
    }

    async fn ping(&self) -> StorageResult<()> {
        self.list_objects("", 1).await.map(|_| ())
    }
}
