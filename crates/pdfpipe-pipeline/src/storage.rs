//! Markdown Storage Worker: consumes storage requests, writes Markdown
//! idempotently keyed on `(itemId, partIndex?)`, emits completion or failure.
//! Sits between conversion/merging and the downstream chunk/embedding
//! stages this pipeline hands off to but does not itself run.

use std::sync::Arc;

use pdfpipe_broker::BrokerAdapter;
use pdfpipe_types::prelude::*;
use tracing::info;

use crate::metrics::PipelineMetrics;
use crate::retry::{publish_failure_or_retry, RetryTarget};

pub struct MarkdownStorageWorker {
    broker: Arc<BrokerAdapter>,
    metadata_store: Arc<dyn MetadataStore>,
    metrics: Arc<PipelineMetrics>,
}

impl MarkdownStorageWorker {
    pub fn new(broker: Arc<BrokerAdapter>, metadata_store: Arc<dyn MetadataStore>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { broker, metadata_store, metrics }
    }

    pub async fn handle(&self, envelope: Envelope<MarkdownStorageRequest>) -> Result<()> {
        let item_id = envelope.item_id.clone();
        match self.store(&item_id, &envelope.payload).await {
            Ok(()) => {
                let completed = Envelope::new(
                    EventType::MarkdownStorageCompleted,
                    item_id.clone(),
                    MarkdownStorageCompleted {
                        is_part: envelope.payload.metadata.is_part,
                        part_index: envelope.payload.metadata.part_index,
                    },
                );
                self.broker.publish("markdown.storage.completed", &completed, true).await?;
                info!(item_id, is_part = envelope.payload.metadata.is_part, "markdown stored");
                Ok(())
            }
            Err(err) => {
                publish_failure_or_retry(
                    &self.broker,
                    &self.metrics,
                    &envelope,
                    RetryTarget {
                        retry_routing_key: "markdown.storage.request",
                        failed_routing_key: "markdown.storage.failed",
                        failed_event: EventType::MarkdownStorageFailed,
                    },
                    &err,
                    |can_retry| serde_json::to_value(MarkdownStorageFailed { error: err.to_string(), can_retry }).unwrap(),
                )
                .await
            }
        }
    }

    /// Part writes land in their own `(itemId, partIndex)` slot, so replaying
    /// the same request overwrites that slot with identical content instead
    /// of appending a duplicate; a whole-PDF or merged write replaces the
    /// stored content outright, which is likewise stable on replay.
    async fn store(&self, item_id: &str, payload: &MarkdownStorageRequest) -> Result<()> {
        match payload.metadata.part_index {
            Some(part_index) => {
                self.metadata_store.save_markdown_part(item_id, part_index, &payload.markdown_content).await
            }
            None => self.metadata_store.save_markdown(item_id, &payload.markdown_content).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfpipe_collab::InMemoryMetadataStore;

    async fn store(metadata_store: &InMemoryMetadataStore, item_id: &str, payload: &MarkdownStorageRequest) {
        match payload.metadata.part_index {
            Some(part_index) => metadata_store
                .save_markdown_part(item_id, part_index, &payload.markdown_content)
                .await
                .unwrap(),
            None => metadata_store.save_markdown(item_id, &payload.markdown_content).await.unwrap(),
        }
    }

    #[tokio::test]
    async fn whole_pdf_write_replaces_stored_content() {
        let metadata_store = InMemoryMetadataStore::new();
        metadata_store.save_markdown("item-1", "old content").await.unwrap();

        let payload = MarkdownStorageRequest {
            markdown_content: "new content".into(),
            metadata: ConversionMetadata { processing_time_ms: 1, part_index: None, is_part: false },
        };
        store(&metadata_store, "item-1", &payload).await;
        assert_eq!(metadata_store.get_markdown("item-1").await.unwrap().unwrap(), "new content");
    }

    #[tokio::test]
    async fn part_write_lands_in_its_own_slot() {
        let metadata_store = InMemoryMetadataStore::new();
        let part_one = MarkdownStorageRequest {
            markdown_content: "\n\n--- PART 1 ---\n\nfirst".into(),
            metadata: ConversionMetadata { processing_time_ms: 1, part_index: Some(0), is_part: true },
        };
        let part_two = MarkdownStorageRequest {
            markdown_content: "\n\n--- PART 2 ---\n\nsecond".into(),
            metadata: ConversionMetadata { processing_time_ms: 1, part_index: Some(1), is_part: true },
        };
        store(&metadata_store, "item-1", &part_one).await;
        store(&metadata_store, "item-1", &part_two).await;

        let parts = metadata_store.get_markdown_parts("item-1").await.unwrap();
        assert_eq!(parts, vec![part_one.markdown_content.clone(), part_two.markdown_content.clone()]);
    }

    #[tokio::test]
    async fn replaying_a_part_write_does_not_duplicate_it() {
        let metadata_store = InMemoryMetadataStore::new();
        let part_one = MarkdownStorageRequest {
            markdown_content: "\n\n--- PART 1 ---\n\nfirst".into(),
            metadata: ConversionMetadata { processing_time_ms: 1, part_index: Some(0), is_part: true },
        };
        store(&metadata_store, "item-1", &part_one).await;
        store(&metadata_store, "item-1", &part_one).await;

        let parts = metadata_store.get_markdown_parts("item-1").await.unwrap();
        assert_eq!(parts.len(), 1);
    }
}
