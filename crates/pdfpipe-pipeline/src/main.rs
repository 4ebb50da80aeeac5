use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pdfpipe_collab::{HttpPdfConverter, InMemoryMetadataStore, InMemoryObjectStore};
use pdfpipe_config::{CliArgs, PartTrackerBackend, PipelineConfig};
use pdfpipe_pipeline::prelude::PipelineService;
use pdfpipe_tracker::{MongoPartTracker, SearchIndexPartTracker};
use pdfpipe_types::ports::{MetadataStore, ObjectStore, PartTrackerStore, PdfConverter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let args = CliArgs::parse();
    let config = args.apply_to(PipelineConfig::from_env()?)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        broker_url = %config.broker_url,
        split_threshold = config.split_threshold,
        max_retries = config.max_retries,
        part_tracker_backend = ?config.part_tracker_backend,
        "Starting PDF pipeline worker"
    );

    let object_store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let metadata_store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
    let converter: Arc<dyn PdfConverter> =
        Arc::new(HttpPdfConverter::new(config.converter_endpoint.clone(), config.converter_timeout_ms));

    let part_tracker: Arc<dyn PartTrackerStore> = match config.part_tracker_backend {
        PartTrackerBackend::Document => Arc::new(
            MongoPartTracker::connect(&config.part_tracker_mongo_uri, &config.part_tracker_mongo_database).await?,
        ),
        PartTrackerBackend::SearchIndex => {
            let path = std::path::PathBuf::from(&config.part_tracker_index_path);
            std::fs::create_dir_all(&path)?;
            Arc::new(SearchIndexPartTracker::open_or_create_in_dir(&path)?)
        }
    };

    tracing::info!("Initializing pipeline service");
    let service = PipelineService::new(&config, object_store, metadata_store, converter, part_tracker).await?;
    tracing::info!("Pipeline service initialized successfully");

    let shutdown_signal = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
        tracing::info!("Received shutdown signal, initiating graceful shutdown");
    };

    service.run_until(shutdown_signal).await?;
    service.stop().await?;

    tracing::info!("PDF pipeline worker shutdown complete");
    Ok(())
}
