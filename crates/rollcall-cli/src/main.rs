use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, SdkConfig};
use clap::{Parser, Subcommand};
use rollcall_aws::{DynamoRecordStore, RekognitionComparator, S3BlobStore};
use rollcall_core::blobs::BlobStore;
use rollcall_core::{identifier_for_key, IdentifyEngine, MatchPolicy, ProbeImage, Record};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall enrollment and identification CLI")]
struct Cli {
    /// S3 bucket holding the reference image gallery
    #[arg(long, default_value = "speechrekog")]
    bucket: String,
    /// DynamoDB table holding one record per identifier
    #[arg(long, default_value = "iSHIP")]
    table: String,
    /// Attribute name of the table's partition key
    #[arg(long, default_value = "Roll Number")]
    key_field: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a reference photo and its record
    Enroll {
        /// Identifier the record lives under
        identifier: String,
        /// Path to the reference photo
        #[arg(short, long)]
        photo: PathBuf,
        /// Record fields as a JSON object
        #[arg(short, long, default_value = "{}")]
        record: String,
    },
    /// List enrolled reference images
    List,
    /// Remove a reference image and its record
    Remove {
        /// Identifier to remove
        identifier: String,
    },
    /// Identify the face in a photo against the enrolled gallery
    Identify {
        /// Path to the probe photo
        #[arg(short, long)]
        photo: PathBuf,
        /// Similarity a comparison must strictly exceed
        #[arg(long, default_value_t = 90.0)]
        threshold: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let blobs = S3BlobStore::new(aws_sdk_s3::Client::new(&aws), cli.bucket.clone());
    let records = DynamoRecordStore::new(
        aws_sdk_dynamodb::Client::new(&aws),
        cli.table.clone(),
        cli.key_field.clone(),
    );

    match cli.command {
        Commands::Enroll {
            identifier,
            photo,
            record,
        } => enroll(&blobs, &records, &identifier, &photo, &record).await,
        Commands::List => list(&blobs).await,
        Commands::Remove { identifier } => remove(&blobs, &records, &identifier).await,
        Commands::Identify { photo, threshold } => {
            identify(blobs, records, &aws, &cli.bucket, &photo, threshold).await
        }
    }
}

async fn enroll(
    blobs: &S3BlobStore,
    records: &DynamoRecordStore,
    identifier: &str,
    photo: &Path,
    record_json: &str,
) -> Result<()> {
    let record: Record =
        serde_json::from_str(record_json).context("record must be a JSON object")?;
    let bytes =
        std::fs::read(photo).with_context(|| format!("failed to read {}", photo.display()))?;
    let extension = photo.extension().and_then(|e| e.to_str()).unwrap_or("jpg");
    let key = format!("{identifier}.{extension}");

    blobs.put(&key, &bytes).await?;
    records.store(identifier, &record).await?;
    println!("enrolled {identifier} as {key}");
    Ok(())
}

async fn list(blobs: &S3BlobStore) -> Result<()> {
    let keys = blobs.list().await?;
    if keys.is_empty() {
        println!("no references enrolled");
        return Ok(());
    }
    for key in keys {
        println!("{}\t{}", identifier_for_key(&key), key);
    }
    Ok(())
}

async fn remove(
    blobs: &S3BlobStore,
    records: &DynamoRecordStore,
    identifier: &str,
) -> Result<()> {
    let keys = blobs.list().await?;
    let mut removed = 0;
    for key in keys.iter().filter(|k| identifier_for_key(k) == identifier) {
        blobs.delete(key).await?;
        println!("removed {key}");
        removed += 1;
    }
    records.remove(identifier).await?;
    if removed == 0 {
        println!("no reference image for {identifier}; record cleared");
    }
    Ok(())
}

async fn identify(
    blobs: S3BlobStore,
    records: DynamoRecordStore,
    aws: &SdkConfig,
    bucket: &str,
    photo: &Path,
    threshold: f32,
) -> Result<()> {
    let bytes =
        std::fs::read(photo).with_context(|| format!("failed to read {}", photo.display()))?;
    let extension = photo.extension().and_then(|e| e.to_str()).unwrap_or("png");
    let probe = ProbeImage {
        key: format!("{}.{extension}", Uuid::new_v4()),
        bytes,
    };

    let comparator =
        RekognitionComparator::new(aws_sdk_rekognition::Client::new(aws), bucket.to_string());
    let engine = IdentifyEngine::new(
        blobs,
        comparator,
        records,
        MatchPolicy {
            similarity_threshold: threshold,
        },
    );

    let result = engine.identify(probe).await?;
    for fault in &result.faults {
        eprintln!("warning: {fault}");
    }
    match result.identification {
        Some(identification) => {
            println!(
                "identified {} after {} comparisons",
                identification.identifier, result.compared
            );
            println!("{}", serde_json::to_string_pretty(&identification.record)?);
        }
        None => println!("no match among {} references", result.compared),
    }
    Ok(())
}
