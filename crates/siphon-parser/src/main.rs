use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use siphon_bus::{sqs_client, EventBus, SqsQueue};
use siphon_core::ParserConfig;
use siphon_db::{PgDataSchemaStore, PgIngestJobStore, PgProcessedDataStore};
use siphon_parser::{run_error_logger, FileProcessingDispatcher};
use siphon_storage::S3ObjectStorage;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "siphon=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ParserConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.shared.db_max_connections)
        .connect(&config.shared.database_url)
        .await
        .context("connecting to database")?;
    siphon_db::MIGRATOR
        .run(&pool)
        .await
        .context("running migrations")?;

    let storage = Arc::new(
        S3ObjectStorage::new(
            config.shared.raw_data_bucket.clone(),
            config.shared.aws_region.clone(),
            config.shared.aws_endpoint.clone(),
        )
        .await
        .context("initializing object storage")?,
    );

    let sqs = sqs_client(
        config.shared.aws_region.clone(),
        config.shared.aws_endpoint.clone(),
    )
    .await;
    let bus = EventBus::new(
        Arc::new(SqsQueue::new(sqs.clone(), config.shared.success_queue_url.clone())),
        Arc::new(SqsQueue::new(sqs, config.shared.error_queue_url.clone())),
    );

    let dispatcher = FileProcessingDispatcher::new(
        Arc::new(PgIngestJobStore::new(pool.clone())),
        Arc::new(PgDataSchemaStore::new(pool.clone())),
        Arc::new(PgProcessedDataStore::new(pool)),
        storage,
        bus.clone(),
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let error_logger = tokio::spawn(run_error_logger(bus, shutdown.clone()));
    dispatcher.run(shutdown).await;
    error_logger.await.ok();
    Ok(())
}
