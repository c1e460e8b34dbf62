//! Record store capability — key→record lookup in a managed table.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Record;

#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("record lookup for {identifier} failed: {message}")]
    Lookup { identifier: String, message: String },
    #[error("record write for {identifier} failed: {message}")]
    Write { identifier: String, message: String },
}

/// Key→structured-record lookup addressed by a single logical identifier
/// field. The table and the key field name are fixed at construction.
#[async_trait]
pub trait RecordStore {
    /// Fetch the record stored under `identifier`, if one exists.
    async fn fetch(&self, identifier: &str) -> Result<Option<Record>, RecordStoreError>;
}
