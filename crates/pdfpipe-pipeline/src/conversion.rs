//! Conversion Worker: two consumers sharing the same converter call
//! — whole-PDF requests and per-part requests — plus the idempotent
//! merge-trigger check that fires after the last part completes.

use std::sync::Arc;
use std::time::Instant;

use pdfpipe_broker::BrokerAdapter;
use pdfpipe_types::prelude::*;
use tracing::{info, warn};

use crate::metrics::PipelineMetrics;
use crate::retry::{publish_failure_or_retry, RetryTarget};

pub struct ConversionWorker {
    broker: Arc<BrokerAdapter>,
    object_store: Arc<dyn ObjectStore>,
    converter: Arc<dyn PdfConverter>,
    part_tracker: Arc<dyn PartTrackerStore>,
    metrics: Arc<PipelineMetrics>,
}

impl ConversionWorker {
    pub fn new(
        broker: Arc<BrokerAdapter>,
        object_store: Arc<dyn ObjectStore>,
        converter: Arc<dyn PdfConverter>,
        part_tracker: Arc<dyn PartTrackerStore>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self { broker, object_store, converter, part_tracker, metrics }
    }

    async fn report_progress(&self, item_id: &str, progress: u8, message: &str) -> Result<()> {
        let envelope = Envelope::new(
            EventType::PdfConversionProgress,
            item_id.to_string(),
            PdfConversionProgress { progress, message: message.to_string() },
        );
        self.broker.publish("pdf.conversion.progress", &envelope, false).await
    }

    async fn run_conversion(&self, item_id: &str, object_key: &str) -> Result<(String, u64)> {
        self.report_progress(item_id, 0, "Starting").await?;
        let presigned_url = self.object_store.get_pdf_download_url(object_key).await?;
        self.report_progress(item_id, 10, "Resolved presigned URL").await?;

        let started = Instant::now();
        self.report_progress(item_id, 30, "Invoking converter").await?;
        let response = self.converter.convert_from_url(&presigned_url).await?;
        self.report_progress(item_id, 60, "Converter returned").await?;

        if !response.success {
            return Err(PipelineError::ConverterFailed(
                response.error.unwrap_or_else(|| "converter reported failure with no message".into()),
            ));
        }

        let markdown = response
            .data
            .ok_or_else(|| PipelineError::ConverterFailed("converter reported success with no data".into()))?
            .into_markdown();

        self.report_progress(item_id, 80, "Conversion complete").await?;
        Ok((markdown, started.elapsed().as_millis() as u64))
    }

    /// Handles a whole-PDF (no splitting) conversion request.
    pub async fn handle_whole(&self, envelope: Envelope<PdfConversionRequest>) -> Result<()> {
        let item_id = envelope.item_id.clone();
        match self.run_conversion(&item_id, &envelope.payload.object_key).await {
            Ok((markdown, processing_time_ms)) => {
                let storage_request = Envelope::new(
                    EventType::MarkdownStorageRequest,
                    item_id.clone(),
                    MarkdownStorageRequest {
                        markdown_content: markdown.clone(),
                        metadata: ConversionMetadata { processing_time_ms, part_index: None, is_part: false },
                    },
                );
                self.broker.publish("markdown.storage.request", &storage_request, true).await?;

                let completed = Envelope::new(
                    EventType::PdfConversionCompleted,
                    item_id.clone(),
                    PdfConversionCompleted { status: "Completed".into(), markdown_content: markdown, processing_time_ms },
                );
                self.broker.publish("pdf.conversion.completed", &completed, true).await?;
                self.metrics.record_item_completed();
                info!(item_id, "whole-pdf conversion completed");
                Ok(())
            }
            Err(err) => {
                publish_failure_or_retry(
                    &self.broker,
                    &self.metrics,
                    &envelope,
                    RetryTarget {
                        retry_routing_key: "pdf.conversion.request",
                        failed_routing_key: "pdf.conversion.failed",
                        failed_event: EventType::PdfConversionFailed,
                    },
                    &err,
                    |can_retry| serde_json::to_value(PdfConversionFailed { error: err.to_string(), can_retry }).unwrap(),
                )
                .await
            }
        }
    }

    /// Handles a single split-part conversion request.
    pub async fn handle_part(&self, envelope: Envelope<PdfPartConversionRequest>) -> Result<()> {
        let item_id = envelope.item_id.clone();
        let payload = envelope.payload.clone();

        match self.part_tracker.get_all_part_statuses(&item_id).await? {
            None => self.part_tracker.initialize(&item_id, payload.total_parts).await?,
            Some(entry) if entry.parts[payload.part_index].status == PartStatus::Failed => {
                self.part_tracker
                    .update_part_status(&item_id, payload.part_index, PartStatus::Pending, None)
                    .await?;
            }
            Some(_) => {}
        }
        self.part_tracker
            .update_part_status(&item_id, payload.part_index, PartStatus::Processing, None)
            .await?;

        match self.run_conversion(&item_id, &payload.object_key).await {
            Ok((markdown, processing_time_ms)) => {
                let marked = format!("\n\n--- PART {} ---\n\n{markdown}", payload.part_index + 1);
                let storage_request = Envelope::new(
                    EventType::MarkdownStorageRequest,
                    item_id.clone(),
                    MarkdownStorageRequest {
                        markdown_content: marked,
                        metadata: ConversionMetadata {
                            processing_time_ms,
                            part_index: Some(payload.part_index),
                            is_part: true,
                        },
                    },
                );
                self.broker.publish("markdown.storage.request", &storage_request, true).await?;

                self.part_tracker
                    .update_part_status(&item_id, payload.part_index, PartStatus::Completed, None)
                    .await?;

                let part_completed = Envelope::new(
                    EventType::PdfPartConversionCompleted,
                    item_id.clone(),
                    PdfPartConversionCompleted { part_index: payload.part_index, total_parts: payload.total_parts },
                );
                self.broker.publish("pdf.part.conversion.completed", &part_completed, true).await?;
                self.metrics.record_part_converted();

                self.check_and_trigger_merging(&item_id).await?;
                Ok(())
            }
            Err(err) => {
                self.part_tracker
                    .update_part_status(&item_id, payload.part_index, PartStatus::Failed, Some(err.to_string()))
                    .await?;
                self.metrics.record_part_failed();
                publish_failure_or_retry(
                    &self.broker,
                    &self.metrics,
                    &envelope,
                    RetryTarget {
                        retry_routing_key: "pdf.part.conversion.request",
                        failed_routing_key: "pdf.part.conversion.failed",
                        failed_event: EventType::PdfPartConversionFailed,
                    },
                    &err,
                    |can_retry| {
                        serde_json::to_value(PdfPartConversionFailed {
                            part_index: payload.part_index,
                            error: err.to_string(),
                            can_retry,
                        })
                        .unwrap()
                    },
                )
                .await
            }
        }
    }

    /// Idempotent: safe to call after every part completion. Publishes
    /// exactly one `PdfMergingRequest` the first time it observes all parts
    /// done; under a tracker race both callers may observe `true` and
    /// publish, which the Merger absorbs.
    async fn check_and_trigger_merging(&self, item_id: &str) -> Result<()> {
        if self.part_tracker.are_all_parts_completed(item_id).await? {
            let completed_parts = self.part_tracker.get_completed_parts(item_id).await?;
            let request = Envelope::new(
                EventType::PdfMergingRequest,
                item_id.to_string(),
                PdfMergingRequest { total_parts: completed_parts.len(), completed_parts },
            );
            self.broker.publish("pdf.merging.request", &request, true).await?;
            self.metrics.record_merge_triggered();
            info!(item_id, "all parts completed, triggered merge");
        } else if self.part_tracker.has_any_part_failed(item_id).await? {
            warn!(item_id, "part failed and not all parts completed, awaiting retry or operator action");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_marker_uses_one_based_label() {
        let marked = format!("\n\n--- PART {} ---\n\n{}", 0 + 1, "body");
        assert!(marked.starts_with("\n\n--- PART 1 ---\n\nbody"));
    }
}
