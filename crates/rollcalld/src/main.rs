//! rollcalld — capture page and face-identification HTTP service.

use anyhow::Result;
use aws_config::BehaviorVersion;
use rollcall_aws::{DynamoRecordStore, RekognitionComparator, S3BlobStore};
use rollcall_core::{IdentifyEngine, MatchPolicy};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod http;
mod staging;
mod views;

use config::Config;
use staging::Staging;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        bucket = %config.bucket,
        table = %config.table,
        threshold = config.similarity_threshold,
        "rollcalld starting"
    );

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let engine = IdentifyEngine::new(
        S3BlobStore::new(aws_sdk_s3::Client::new(&aws), config.bucket.clone()),
        RekognitionComparator::new(aws_sdk_rekognition::Client::new(&aws), config.bucket.clone()),
        DynamoRecordStore::new(
            aws_sdk_dynamodb::Client::new(&aws),
            config.table.clone(),
            config.key_field.clone(),
        ),
        MatchPolicy {
            similarity_threshold: config.similarity_threshold,
        },
    );
    let staging = Staging::new(&config.staging_dir)?;
    let state = http::AppState::new(engine, staging);

    let app = http::router(state);
    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "rollcalld ready");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("rollcalld shutting down");
}
