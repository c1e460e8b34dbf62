//! rollcall-core — Matching workflow for face-based record lookup.
//!
//! Defines the capability interfaces (blob store, face comparator, record
//! store) and the engine that walks enrolled references to identify a
//! probe image. Backends live in rollcall-aws.

pub mod blobs;
pub mod engine;
pub mod faces;
pub mod records;
pub mod types;

pub use engine::{IdentifyEngine, IdentifyError, IdentifyResult, MatchPolicy, StepFault};
pub use types::{identifier_for_key, FaceMatch, Identification, ProbeImage, Record};
