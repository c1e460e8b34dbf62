//! S3-backed blob store for probe and reference images.

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use rollcall_core::blobs::{BlobStore, BlobStoreError};

/// One bucket holding every enrolled reference image, plus probe images
/// for the duration of a single identification.
#[derive(Clone)]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|err| BlobStoreError::Put {
                key: key.to_string(),
                message: DisplayErrorContext(err).to_string(),
            })?;
        tracing::debug!(bucket = %self.bucket, key, "object stored");
        Ok(())
    }

    /// Lists every key in the bucket, in the lexicographic order S3
    /// serves them. Pages through the listing so galleries past the
    /// single-response cap still enumerate completely.
    async fn list(&self) -> Result<Vec<String>, BlobStoreError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|err| BlobStoreError::List(DisplayErrorContext(err).to_string()))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }
        tracing::debug!(bucket = %self.bucket, count = keys.len(), "bucket listed");
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| BlobStoreError::Delete {
                key: key.to_string(),
                message: DisplayErrorContext(err).to_string(),
            })?;
        Ok(())
    }
}
