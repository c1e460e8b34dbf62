//! rollcall-aws — AWS backends for the rollcall matching workflow.
//!
//! S3 holds the image gallery, Rekognition scores face pairs, and
//! DynamoDB keeps the record behind each identifier.

pub mod dynamo;
pub mod rekognition;
pub mod s3;

pub use dynamo::DynamoRecordStore;
pub use rekognition::RekognitionComparator;
pub use s3::S3BlobStore;
