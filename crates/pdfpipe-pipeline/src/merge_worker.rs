//! Merger worker: wraps the pure [`crate::merger::merge`]
//! function with the I/O and messaging steps — fetch, progress, publish,
//! retry, and on exhaustion mark the item `Failed`.

use std::sync::Arc;
use std::time::Instant;

use pdfpipe_broker::BrokerAdapter;
use pdfpipe_types::prelude::*;
use tracing::info;

use crate::merger::merge;
use crate::metrics::PipelineMetrics;
use crate::retry::{publish_failure_or_retry, RetryTarget};

pub struct MergerWorker {
    broker: Arc<BrokerAdapter>,
    metadata_store: Arc<dyn MetadataStore>,
    metrics: Arc<PipelineMetrics>,
}

impl MergerWorker {
    pub fn new(broker: Arc<BrokerAdapter>, metadata_store: Arc<dyn MetadataStore>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { broker, metadata_store, metrics }
    }

    pub async fn handle(&self, envelope: Envelope<PdfMergingRequest>) -> Result<()> {
        let item_id = envelope.item_id.clone();
        match self.merge_and_publish(&item_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let result = publish_failure_or_retry(
                    &self.broker,
                    &self.metrics,
                    &envelope,
                    RetryTarget {
                        retry_routing_key: "pdf.merging.request",
                        failed_routing_key: "pdf.conversion.failed",
                        failed_event: EventType::PdfConversionFailed,
                    },
                    &err,
                    |_| serde_json::to_value(PdfConversionFailed { error: err.to_string(), can_retry: false }).unwrap(),
                )
                .await;

                if decide_retry(envelope.retry_count, envelope.max_retries, ErrorKind::from(&err)) == RetryDecision::Fail {
                    if let Some(mut item) = self.metadata_store.get_metadata(&item_id).await? {
                        item.mark_failed(err.to_string());
                        self.metadata_store.update_metadata(&item).await?;
                    }
                    self.metrics.record_item_failed();
                }
                result
            }
        }
    }

    async fn merge_and_publish(&self, item_id: &str) -> Result<()> {
        let parts = self.metadata_store.get_markdown_parts(item_id).await?;
        if parts.is_empty() {
            return Err(PipelineError::ItemNotFound { item_id: item_id.to_string() });
        }
        let stored = parts.join("");

        let started = Instant::now();
        let progress = Envelope::new(
            EventType::PdfMergingProgress,
            item_id.to_string(),
            PdfMergingProgress { progress: 80, message: "merging parts".into() },
        );
        self.broker.publish("pdf.merging.progress", &progress, false).await?;

        let merged = merge(&stored);

        let progress = Envelope::new(
            EventType::PdfMergingProgress,
            item_id.to_string(),
            PdfMergingProgress { progress: 95, message: "writing merged document".into() },
        );
        self.broker.publish("pdf.merging.progress", &progress, false).await?;

        self.metadata_store.save_markdown(item_id, &merged).await?;

        let processing_time_ms = started.elapsed().as_millis() as u64;
        let storage_request = Envelope::new(
            EventType::MarkdownStorageRequest,
            item_id.to_string(),
            MarkdownStorageRequest {
                markdown_content: merged.clone(),
                metadata: ConversionMetadata { processing_time_ms, part_index: None, is_part: false },
            },
        );
        self.broker.publish("markdown.storage.request", &storage_request, true).await?;

        let completed = Envelope::new(
            EventType::PdfConversionCompleted,
            item_id.to_string(),
            PdfConversionCompleted { status: "Completed".into(), markdown_content: merged, processing_time_ms },
        );
        self.broker.publish("pdf.conversion.completed", &completed, true).await?;

        if let Some(mut item) = self.metadata_store.get_metadata(item_id).await? {
            item.mark_completed();
            self.metadata_store.update_metadata(&item).await?;
        }
        self.metrics.record_item_completed();

        info!(item_id, "merge completed and published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfpipe_collab::InMemoryMetadataStore;
    use pdfpipe_types::item::Item;

    #[tokio::test]
    async fn merging_is_a_no_op_without_a_live_broker_but_reads_stored_parts() {
        let store = Arc::new(InMemoryMetadataStore::new());
        store.seed(Item::new("item-1", "obj-1"));
        store.save_markdown_part("item-1", 0, "\n\n--- PART 1 ---\n\nfirst\n").await.unwrap();

        let parts = store.get_markdown_parts("item-1").await.unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].contains("--- PART 1 ---"));
    }
}
