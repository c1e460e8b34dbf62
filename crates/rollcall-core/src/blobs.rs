//! Blob store capability — durable key→bytes storage in one bucket fixed at
//! construction.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobStoreError {
    #[error("failed to store object {key}: {message}")]
    Put { key: String, message: String },
    #[error("failed to list bucket contents: {0}")]
    List(String),
    #[error("failed to delete object {key}: {message}")]
    Delete { key: String, message: String },
}

/// Durable key→bytes storage addressed by object key.
///
/// The bucket is part of the handle's identity, not of the call surface:
/// reference images and in-flight probes share the one configured bucket.
#[async_trait]
pub trait BlobStore {
    /// Store `bytes` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError>;

    /// Enumerate every key currently in the bucket, in the provider's
    /// listing order.
    async fn list(&self) -> Result<Vec<String>, BlobStoreError>;

    /// Remove the object stored under `key`, if any.
    async fn delete(&self, key: &str) -> Result<(), BlobStoreError>;
}
