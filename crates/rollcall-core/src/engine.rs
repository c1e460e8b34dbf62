//! The matching workflow: turn one probe image into an optional
//! `(identifier, record)` pair by orchestrating the blob store, the face
//! comparator, and the record store.

use thiserror::Error;

use crate::blobs::{BlobStore, BlobStoreError};
use crate::faces::{CompareError, FaceComparator};
use crate::records::{RecordStore, RecordStoreError};
use crate::types::{identifier_for_key, Identification, ProbeImage};

#[derive(Error, Debug)]
pub enum IdentifyError {
    /// Enumerating the bucket failed. The one failure the workflow cannot
    /// degrade into a no-match: without the listing there is no candidate
    /// set at all.
    #[error("failed to enumerate reference images: {0}")]
    List(BlobStoreError),
}

/// A service failure observed and absorbed during one identification.
///
/// Faults never abort the run (see [`IdentifyError`] for the one exception).
/// They exist so callers and tests can tell a degraded run from a genuine
/// no-match; to the end user both render identically.
#[derive(Error, Debug)]
pub enum StepFault {
    #[error("probe upload failed: {0}")]
    Upload(BlobStoreError),
    #[error("comparison against {key} failed: {source}")]
    Compare { key: String, source: CompareError },
    #[error("record lookup for matched key {key} failed: {source}")]
    Lookup { key: String, source: RecordStoreError },
    #[error("probe cleanup failed: {0}")]
    Cleanup(BlobStoreError),
}

/// Policy knobs for the matching workflow.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    /// Similarity cutoff in [0, 100]. A candidate counts as a match only
    /// when some reported score is strictly greater than this.
    pub similarity_threshold: f32,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: 90.0,
        }
    }
}

/// Outcome of one identification run.
#[derive(Debug)]
pub struct IdentifyResult {
    /// The match, if any candidate crossed the threshold and had a record.
    pub identification: Option<Identification>,
    /// Object key the probe traveled under.
    pub probe_key: String,
    /// Number of candidate keys compared before the run ended.
    pub compared: usize,
    /// Service failures absorbed along the way.
    pub faults: Vec<StepFault>,
}

/// The matching workflow over injected capability handles.
///
/// Handles are built once at process start and live for the process
/// lifetime; tests substitute in-memory fakes through the same seam.
pub struct IdentifyEngine<B, F, R> {
    blobs: B,
    faces: F,
    records: R,
    policy: MatchPolicy,
}

impl<B, F, R> IdentifyEngine<B, F, R>
where
    B: BlobStore + Sync,
    F: FaceComparator + Sync,
    R: RecordStore + Sync,
{
    pub fn new(blobs: B, faces: F, records: R, policy: MatchPolicy) -> Self {
        Self {
            blobs,
            faces,
            records,
            policy,
        }
    }

    /// Identify one probe image against every enrolled reference.
    ///
    /// Uploads the probe, walks the bucket listing in order (skipping the
    /// probe's own key), and stops at the first reference whose comparison
    /// crosses the similarity threshold and whose identifier has a record.
    /// A threshold-crossing reference without a record does not end the
    /// walk; the next candidate is tried. Soft failures are logged and
    /// recorded on the result; only a listing failure aborts, and the probe
    /// object is reclaimed before that error surfaces.
    pub async fn identify(&self, probe: ProbeImage) -> Result<IdentifyResult, IdentifyError> {
        let mut faults = Vec::new();

        if let Err(err) = self.blobs.put(&probe.key, &probe.bytes).await {
            tracing::warn!(key = %probe.key, error = %err, "probe upload failed; continuing");
            faults.push(StepFault::Upload(err));
        } else {
            tracing::debug!(key = %probe.key, size = probe.bytes.len(), "probe uploaded");
        }

        let keys = match self.blobs.list().await {
            Ok(keys) => keys,
            Err(err) => {
                self.discard_probe(&probe.key).await;
                return Err(IdentifyError::List(err));
            }
        };

        let mut identification = None;
        let mut compared = 0;
        for key in keys.iter().filter(|k| k.as_str() != probe.key) {
            compared += 1;
            let matches = match self.faces.compare(&probe.key, key).await {
                Ok(matches) => matches,
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "comparison failed; skipping candidate");
                    faults.push(StepFault::Compare {
                        key: key.clone(),
                        source: err,
                    });
                    continue;
                }
            };

            if !matches
                .iter()
                .any(|m| m.similarity > self.policy.similarity_threshold)
            {
                continue;
            }

            let identifier = identifier_for_key(key);
            tracing::info!(key = %key, identifier, "reference crossed similarity threshold");

            match self.records.fetch(identifier).await {
                Ok(Some(record)) => {
                    identification = Some(Identification {
                        identifier: identifier.to_string(),
                        record,
                    });
                    break;
                }
                Ok(None) => {
                    tracing::warn!(identifier, "matched reference has no record; trying next candidate");
                }
                Err(err) => {
                    tracing::warn!(identifier, error = %err, "record lookup failed; trying next candidate");
                    faults.push(StepFault::Lookup {
                        key: key.clone(),
                        source: err,
                    });
                }
            }
        }

        if let Some(fault) = self.discard_probe(&probe.key).await {
            faults.push(fault);
        }

        match &identification {
            Some(id) => tracing::info!(identifier = %id.identifier, compared, "probe identified"),
            None => tracing::info!(compared, faults = faults.len(), "no matching reference"),
        }

        Ok(IdentifyResult {
            identification,
            probe_key: probe.key,
            compared,
            faults,
        })
    }

    /// Best-effort removal of the probe object once a run ends, matched or
    /// not. A probe left behind would turn up as a candidate in every later
    /// request.
    async fn discard_probe(&self, key: &str) -> Option<StepFault> {
        match self.blobs.delete(key).await {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "probe cleanup failed");
                Some(StepFault::Cleanup(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FaceMatch, Record};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type SharedObjects = Arc<Mutex<Vec<(String, Vec<u8>)>>>;
    type SharedCalls = Arc<Mutex<Vec<(String, String)>>>;

    /// In-memory bucket. `put` makes the probe visible to `list`, exactly as
    /// a real bucket listing includes the just-uploaded key.
    #[derive(Default)]
    struct FakeBlobStore {
        objects: SharedObjects,
        deleted: Arc<Mutex<Vec<String>>>,
        fail_put: bool,
        fail_list: bool,
        fail_delete: bool,
    }

    impl FakeBlobStore {
        fn with_references(refs: &[(&str, &[u8])]) -> Self {
            let objects = refs
                .iter()
                .map(|(k, b)| (k.to_string(), b.to_vec()))
                .collect();
            Self {
                objects: Arc::new(Mutex::new(objects)),
                ..Default::default()
            }
        }

        fn objects(&self) -> SharedObjects {
            Arc::clone(&self.objects)
        }

        fn deleted(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.deleted)
        }
    }

    #[async_trait]
    impl BlobStore for FakeBlobStore {
        async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError> {
            if self.fail_put {
                return Err(BlobStoreError::Put {
                    key: key.to_string(),
                    message: "unreachable".into(),
                });
            }
            self.objects
                .lock()
                .unwrap()
                .push((key.to_string(), bytes.to_vec()));
            Ok(())
        }

        async fn list(&self) -> Result<Vec<String>, BlobStoreError> {
            if self.fail_list {
                return Err(BlobStoreError::List("unreachable".into()));
            }
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .map(|(k, _)| k.clone())
                .collect())
        }

        async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
            if self.fail_delete {
                return Err(BlobStoreError::Delete {
                    key: key.to_string(),
                    message: "unreachable".into(),
                });
            }
            self.objects.lock().unwrap().retain(|(k, _)| k != key);
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    /// Comparator scripted per candidate key; records every pair it sees.
    #[derive(Default)]
    struct FakeComparator {
        scores: HashMap<String, Vec<f32>>,
        calls: SharedCalls,
        fail_all: bool,
    }

    impl FakeComparator {
        fn scripted(scores: &[(&str, &[f32])]) -> Self {
            Self {
                scores: scores
                    .iter()
                    .map(|(k, s)| (k.to_string(), s.to_vec()))
                    .collect(),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail_all: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> SharedCalls {
            Arc::clone(&self.calls)
        }
    }

    #[async_trait]
    impl FaceComparator for FakeComparator {
        async fn compare(
            &self,
            probe_key: &str,
            candidate_key: &str,
        ) -> Result<Vec<FaceMatch>, CompareError> {
            self.calls
                .lock()
                .unwrap()
                .push((probe_key.to_string(), candidate_key.to_string()));
            if self.fail_all {
                return Err(CompareError::Service {
                    probe: probe_key.to_string(),
                    candidate: candidate_key.to_string(),
                    message: "throttled".into(),
                });
            }
            let scores = self.scores.get(candidate_key).cloned().unwrap_or_default();
            Ok(scores
                .into_iter()
                .map(|similarity| FaceMatch { similarity })
                .collect())
        }
    }

    /// Comparator that scores by content equality, the way a real comparator
    /// reports a near-perfect score for two copies of the same photo.
    struct MirrorComparator {
        objects: SharedObjects,
        calls: SharedCalls,
    }

    #[async_trait]
    impl FaceComparator for MirrorComparator {
        async fn compare(
            &self,
            probe_key: &str,
            candidate_key: &str,
        ) -> Result<Vec<FaceMatch>, CompareError> {
            self.calls
                .lock()
                .unwrap()
                .push((probe_key.to_string(), candidate_key.to_string()));
            let objects = self.objects.lock().unwrap();
            let bytes_of = |key: &str| {
                objects
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, b)| b.clone())
            };
            let similarity = match (bytes_of(probe_key), bytes_of(candidate_key)) {
                (Some(a), Some(b)) if a == b => 99.9,
                _ => 12.0,
            };
            Ok(vec![FaceMatch { similarity }])
        }
    }

    #[derive(Default)]
    struct FakeRecordStore {
        records: HashMap<String, Record>,
        fail_all: bool,
    }

    impl FakeRecordStore {
        fn with_records(records: &[(&str, Record)]) -> Self {
            Self {
                records: records
                    .iter()
                    .map(|(k, r)| (k.to_string(), r.clone()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RecordStore for FakeRecordStore {
        async fn fetch(&self, identifier: &str) -> Result<Option<Record>, RecordStoreError> {
            if self.fail_all {
                return Err(RecordStoreError::Lookup {
                    identifier: identifier.to_string(),
                    message: "unreachable".into(),
                });
            }
            Ok(self.records.get(identifier).cloned())
        }
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    fn probe(key: &str) -> ProbeImage {
        ProbeImage {
            key: key.to_string(),
            bytes: b"probe pixels".to_vec(),
        }
    }

    fn engine<B, F, R>(blobs: B, faces: F, records: R) -> IdentifyEngine<B, F, R>
    where
        B: BlobStore + Sync,
        F: FaceComparator + Sync,
        R: RecordStore + Sync,
    {
        IdentifyEngine::new(blobs, faces, records, MatchPolicy::default())
    }

    #[tokio::test]
    async fn test_no_match_when_no_reference_crosses_threshold() {
        let blobs = FakeBlobStore::with_references(&[("11111.jpg", b"a"), ("22222.jpg", b"b")]);
        let faces = FakeComparator::scripted(&[("11111.jpg", &[10.0]), ("22222.jpg", &[55.5])]);
        let records = FakeRecordStore::default();

        let result = engine(blobs, faces, records)
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(result.identification.is_none());
        assert_eq!(result.compared, 2);
        assert!(result.faults.is_empty());
    }

    #[tokio::test]
    async fn test_exact_threshold_score_does_not_match() {
        let blobs = FakeBlobStore::with_references(&[("12345.jpg", b"a")]);
        let faces = FakeComparator::scripted(&[("12345.jpg", &[90.0])]);
        let records =
            FakeRecordStore::with_records(&[("12345", record(&[("Roll Number", "12345")]))]);

        let result = engine(blobs, faces, records)
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(result.identification.is_none(), "90.0 is not strictly greater than 90.0");
    }

    #[tokio::test]
    async fn test_known_reference_is_identified() {
        let blobs = FakeBlobStore::with_references(&[("12345.jpg", b"alice")]);
        let faces = FakeComparator::scripted(&[("12345.jpg", &[95.2])]);
        let expected = record(&[("Roll Number", "12345"), ("Name", "Alice")]);
        let records = FakeRecordStore::with_records(&[("12345", expected.clone())]);

        let result = engine(blobs, faces, records)
            .identify(probe("p1.png"))
            .await
            .unwrap();

        let id = result.identification.expect("should identify");
        assert_eq!(id.identifier, "12345");
        assert_eq!(id.record, expected);
    }

    #[tokio::test]
    async fn test_any_candidate_above_threshold_counts() {
        // One comparison may report several faces; one crossing score is
        // enough even when others stay low.
        let blobs = FakeBlobStore::with_references(&[("12345.jpg", b"a")]);
        let faces = FakeComparator::scripted(&[("12345.jpg", &[12.0, 96.4, 40.0])]);
        let records =
            FakeRecordStore::with_records(&[("12345", record(&[("Roll Number", "12345")]))]);

        let result = engine(blobs, faces, records)
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(result.identification.is_some());
    }

    #[tokio::test]
    async fn test_first_matching_key_short_circuits() {
        let blobs = FakeBlobStore::with_references(&[
            ("11111.jpg", b"a"),
            ("22222.jpg", b"b"),
            ("33333.jpg", b"c"),
        ]);
        let faces = FakeComparator::scripted(&[
            ("11111.jpg", &[15.0]),
            ("22222.jpg", &[95.0]),
            ("33333.jpg", &[99.0]),
        ]);
        let calls = faces.calls();
        let records = FakeRecordStore::with_records(&[
            ("22222", record(&[("Roll Number", "22222")])),
            ("33333", record(&[("Roll Number", "33333")])),
        ]);

        let result = engine(blobs, faces, records)
            .identify(probe("p1.png"))
            .await
            .unwrap();

        let id = result.identification.expect("should identify");
        assert_eq!(id.identifier, "22222");
        assert_eq!(result.compared, 2, "33333.jpg must never be compared");
        let seen: Vec<String> = calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect();
        assert_eq!(seen, vec!["11111.jpg", "22222.jpg"]);
    }

    #[tokio::test]
    async fn test_empty_bucket_skips_comparator() {
        let blobs = FakeBlobStore::with_references(&[]);
        let faces = FakeComparator::default();
        let calls = faces.calls();

        let result = engine(blobs, faces, FakeRecordStore::default())
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(result.identification.is_none());
        assert_eq!(result.compared, 0);
        assert!(calls.lock().unwrap().is_empty(), "comparator must not run");
    }

    #[tokio::test]
    async fn test_probe_key_excluded_from_candidates() {
        let blobs = FakeBlobStore::with_references(&[("12345.jpg", b"a")]);
        let faces = FakeComparator::scripted(&[("12345.jpg", &[20.0])]);
        let calls = faces.calls();

        engine(blobs, faces, FakeRecordStore::default())
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(
            calls.lock().unwrap().iter().all(|(_, c)| c != "p1.png"),
            "probe must never be compared against itself"
        );
    }

    #[tokio::test]
    async fn test_probe_identical_to_reference_crosses_threshold() {
        // A probe that is byte-for-byte a stored reference must still reach
        // that reference: excluding the probe's own key must not exclude the
        // identical enrollment.
        let blobs = FakeBlobStore::with_references(&[("12345.jpg", b"same photo")]);
        let faces = MirrorComparator {
            objects: blobs.objects(),
            calls: Arc::default(),
        };
        let records =
            FakeRecordStore::with_records(&[("12345", record(&[("Roll Number", "12345")]))]);

        let result = engine(blobs, faces, records)
            .identify(ProbeImage {
                key: "p1.png".into(),
                bytes: b"same photo".to_vec(),
            })
            .await
            .unwrap();

        assert_eq!(
            result.identification.expect("should identify").identifier,
            "12345"
        );
    }

    #[tokio::test]
    async fn test_enumeration_order_is_stable() {
        let blobs = FakeBlobStore::with_references(&[
            ("11111.jpg", b"a"),
            ("22222.jpg", b"b"),
            ("33333.jpg", b"c"),
        ]);
        let faces = FakeComparator::default();
        let calls = faces.calls();
        let engine = engine(blobs, faces, FakeRecordStore::default());

        engine.identify(probe("p1.png")).await.unwrap();
        let first: Vec<String> = calls.lock().unwrap().drain(..).map(|(_, c)| c).collect();
        engine.identify(probe("p2.png")).await.unwrap();
        let second: Vec<String> = calls.lock().unwrap().drain(..).map(|(_, c)| c).collect();

        assert_eq!(first, second);
        assert_eq!(first, vec!["11111.jpg", "22222.jpg", "33333.jpg"]);
    }

    #[tokio::test]
    async fn test_comparator_failures_degrade_to_no_match() {
        let blobs = FakeBlobStore::with_references(&[("11111.jpg", b"a"), ("22222.jpg", b"b")]);
        let faces = FakeComparator::failing();

        let result = engine(blobs, faces, FakeRecordStore::default())
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(result.identification.is_none());
        assert_eq!(result.compared, 2, "a failed comparison must not end the walk");
        assert_eq!(result.faults.len(), 2);
        assert!(result
            .faults
            .iter()
            .all(|f| matches!(f, StepFault::Compare { .. })));
    }

    #[tokio::test]
    async fn test_lookup_miss_continues_to_next_candidate() {
        let blobs = FakeBlobStore::with_references(&[("11111.jpg", b"a"), ("22222.jpg", b"b")]);
        let faces = FakeComparator::scripted(&[("11111.jpg", &[95.0]), ("22222.jpg", &[97.0])]);
        // Only the second matching reference has a record.
        let records =
            FakeRecordStore::with_records(&[("22222", record(&[("Roll Number", "22222")]))]);

        let result = engine(blobs, faces, records)
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert_eq!(
            result.identification.expect("should identify").identifier,
            "22222"
        );
        assert_eq!(result.compared, 2);
    }

    #[tokio::test]
    async fn test_lookup_failure_records_fault_and_continues() {
        let blobs = FakeBlobStore::with_references(&[("11111.jpg", b"a")]);
        let faces = FakeComparator::scripted(&[("11111.jpg", &[95.0])]);
        let records = FakeRecordStore {
            fail_all: true,
            ..Default::default()
        };

        let result = engine(blobs, faces, records)
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(result.identification.is_none());
        assert!(result
            .faults
            .iter()
            .any(|f| matches!(f, StepFault::Lookup { key, .. } if key == "11111.jpg")));
    }

    #[tokio::test]
    async fn test_upload_failure_is_nonfatal() {
        let blobs = FakeBlobStore {
            fail_put: true,
            ..FakeBlobStore::with_references(&[("12345.jpg", b"a")])
        };
        let faces = FakeComparator::scripted(&[("12345.jpg", &[95.0])]);
        let records =
            FakeRecordStore::with_records(&[("12345", record(&[("Roll Number", "12345")]))]);

        let result = engine(blobs, faces, records)
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(matches!(result.faults.first(), Some(StepFault::Upload(_))));
        assert_eq!(result.compared, 1, "enumeration still runs after a failed upload");
    }

    #[tokio::test]
    async fn test_list_failure_aborts() {
        let blobs = FakeBlobStore {
            fail_list: true,
            ..Default::default()
        };

        let result = engine(blobs, FakeComparator::default(), FakeRecordStore::default())
            .identify(probe("p1.png"))
            .await;

        assert!(matches!(result, Err(IdentifyError::List(_))));
    }

    #[tokio::test]
    async fn test_list_failure_still_cleans_up_probe() {
        let blobs = FakeBlobStore {
            fail_list: true,
            ..Default::default()
        };
        let deleted = blobs.deleted();

        let result = engine(blobs, FakeComparator::default(), FakeRecordStore::default())
            .identify(probe("p1.png"))
            .await;

        assert!(matches!(result, Err(IdentifyError::List(_))));
        assert_eq!(*deleted.lock().unwrap(), vec!["p1.png".to_string()]);
    }

    #[tokio::test]
    async fn test_probe_object_cleaned_up() {
        let blobs = FakeBlobStore::with_references(&[("12345.jpg", b"a")]);
        let objects = blobs.objects();
        let deleted = blobs.deleted();
        let faces = FakeComparator::scripted(&[("12345.jpg", &[10.0])]);

        engine(blobs, faces, FakeRecordStore::default())
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert_eq!(deleted.lock().unwrap().as_slice(), ["p1.png".to_string()]);
        assert!(objects.lock().unwrap().iter().all(|(k, _)| k != "p1.png"));
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_recorded() {
        let blobs = FakeBlobStore {
            fail_delete: true,
            ..FakeBlobStore::with_references(&[])
        };

        let result = engine(blobs, FakeComparator::default(), FakeRecordStore::default())
            .identify(probe("p1.png"))
            .await
            .unwrap();

        assert!(matches!(result.faults.last(), Some(StepFault::Cleanup(_))));
    }
}
