//! Rekognition-backed face comparison.

use async_trait::async_trait;
use aws_sdk_rekognition::error::DisplayErrorContext;
use aws_sdk_rekognition::types::{Image, S3Object};
use rollcall_core::faces::{CompareError, FaceComparator};
use rollcall_core::types::FaceMatch;

/// Compares two images already stored in the gallery bucket. Both sides
/// of every comparison are passed by S3 reference so image bytes never
/// travel through this process again after upload.
#[derive(Clone)]
pub struct RekognitionComparator {
    client: aws_sdk_rekognition::Client,
    bucket: String,
}

impl RekognitionComparator {
    pub fn new(client: aws_sdk_rekognition::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn image_ref(&self, key: &str) -> Image {
        Image::builder()
            .s3_object(S3Object::builder().bucket(&self.bucket).name(key).build())
            .build()
    }
}

#[async_trait]
impl FaceComparator for RekognitionComparator {
    /// Runs CompareFaces with the service-side default match threshold;
    /// every reported score comes back and the caller applies its own
    /// cutoff. A score missing from a reported match is dropped rather
    /// than defaulted.
    async fn compare(
        &self,
        probe_key: &str,
        candidate_key: &str,
    ) -> Result<Vec<FaceMatch>, CompareError> {
        let output = self
            .client
            .compare_faces()
            .source_image(self.image_ref(probe_key))
            .target_image(self.image_ref(candidate_key))
            .send()
            .await
            .map_err(|err| CompareError::Service {
                probe: probe_key.to_string(),
                candidate: candidate_key.to_string(),
                message: DisplayErrorContext(err).to_string(),
            })?;

        let matches: Vec<FaceMatch> = output
            .face_matches()
            .iter()
            .filter_map(|m| m.similarity())
            .map(|similarity| FaceMatch { similarity })
            .collect();
        tracing::debug!(
            candidate = candidate_key,
            faces = matches.len(),
            "comparison complete"
        );
        Ok(matches)
    }
}
