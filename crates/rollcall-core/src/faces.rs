//! Face comparison capability — delegated entirely to a managed service.
//!
//! The workflow never sees pixels or embeddings; it submits two object keys
//! and consumes only the threshold predicate over the returned scores.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::FaceMatch;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("face comparison of {probe} against {candidate} failed: {message}")]
    Service {
        probe: String,
        candidate: String,
        message: String,
    },
}

/// Compares two stored images, both addressed by key within the configured
/// bucket, and reports zero or more candidate matches.
///
/// A service may report several candidates for one pair (one per face found
/// in the target image); the caller decides what a score means.
#[async_trait]
pub trait FaceComparator {
    async fn compare(
        &self,
        probe_key: &str,
        candidate_key: &str,
    ) -> Result<Vec<FaceMatch>, CompareError>;
}
