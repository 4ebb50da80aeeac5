//! Splitting Worker: decomposes a PDF into N page-range parts and
//! emits one `PdfPartConversionRequest` per part in bounded batches.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pdfpipe_broker::BrokerAdapter;
use pdfpipe_types::prelude::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics::PipelineMetrics;
use crate::retry::{publish_failure_or_retry, RetryTarget};

const BATCH_SLEEP: Duration = Duration::from_secs(1);

/// Owns a scratch directory for the duration of one split and removes it on
/// every exit path, success or failure.
struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    async fn acquire(item_id: &str) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("pdfpipe-split-{item_id}-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let path = self.path.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                warn!(path = %path.display(), error = %e, "scratch directory cleanup failed");
            }
        });
    }
}

pub struct SplittingWorker {
    broker: Arc<BrokerAdapter>,
    object_store: Arc<dyn ObjectStore>,
    metrics: Arc<PipelineMetrics>,
    concurrent_part_processing: usize,
}

impl SplittingWorker {
    pub fn new(
        broker: Arc<BrokerAdapter>,
        object_store: Arc<dyn ObjectStore>,
        metrics: Arc<PipelineMetrics>,
        concurrent_part_processing: u32,
    ) -> Self {
        Self { broker, object_store, metrics, concurrent_part_processing: concurrent_part_processing.max(1) as usize }
    }

    pub async fn handle(&self, envelope: Envelope<PdfSplittingRequest>) -> Result<()> {
        match self.split_and_dispatch(&envelope).await {
            Ok(()) => {
                self.metrics.record_split();
                Ok(())
            }
            Err(err) => {
                publish_failure_or_retry(
                    &self.broker,
                    &self.metrics,
                    &envelope,
                    RetryTarget {
                        retry_routing_key: "pdf.splitting.request",
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

    async fn split_and_dispatch(&self, envelope: &Envelope<PdfSplittingRequest>) -> Result<()> {
        let item_id = &envelope.item_id;
        let payload = &envelope.payload;
        let scratch = ScratchDir::acquire(item_id).await?;

        let bytes = self.object_store.get_pdf(&payload.object_key).await?;
        let scratch_file = scratch.path.join("original.pdf");
        tokio::fs::write(&scratch_file, &bytes).await?;

        let split_size = payload.split_size.max(1);
        let total_parts = (payload.page_count as f64 / split_size as f64).ceil() as usize;

        let mut part_requests = Vec::with_capacity(total_parts);
        for i in 0..total_parts {
            let start_page = (i as u32) * split_size + 1;
            let end_page = ((i as u32 + 1) * split_size).min(payload.page_count);
            let part_bytes = extract_page_range(&bytes, start_page, end_page);
            let filename = format!("{item_id}-part-{i}.pdf");
            let uploaded = self.object_store.upload_pdf(part_bytes, &filename).await?;

            part_requests.push(Envelope::new(
                EventType::PdfPartConversionRequest,
                item_id.clone(),
                PdfPartConversionRequest {
                    object_key: uploaded.object_key,
                    part_index: i,
                    total_parts,
                    start_page,
                    end_page,
                },
            ));
        }

        for batch in part_requests.chunks(self.concurrent_part_processing) {
            for request in batch {
                self.broker.publish("pdf.part.conversion.request", request, true).await?;
            }
            if batch.len() == self.concurrent_part_processing {
                tokio::time::sleep(BATCH_SLEEP).await;
            }
        }

        info!(item_id, total_parts, "split PDF and dispatched part conversion requests");
        Ok(())
    }
}

/// Placeholder page-range extraction: a production deployment shells out to
/// an external page-range tool (out of scope per the purpose statement).
/// Here the whole byte stream is reused for each part so every part is a
/// valid, independently uploadable object.
fn extract_page_range(bytes: &[u8], _start_page: u32, _end_page: u32) -> Vec<u8> {
    bytes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_parts_is_ceiling_division() {
        let page_count = 100u32;
        let split_size = 25u32;
        let total = (page_count as f64 / split_size as f64).ceil() as usize;
        assert_eq!(total, 4);

        let page_count = 51u32;
        let total = (page_count as f64 / split_size as f64).ceil() as usize;
        assert_eq!(total, 3);
    }

    #[test]
    fn page_ranges_are_one_based_inclusive() {
        let split_size = 25u32;
        let page_count = 60u32;
        let ranges: Vec<(u32, u32)> = (0..3u32)
            .map(|i| (i * split_size + 1, ((i + 1) * split_size).min(page_count)))
            .collect();
        assert_eq!(ranges, vec![(1, 25), (26, 50), (51, 60)]);
    }

    #[tokio::test]
    async fn scratch_dir_is_created_under_temp() {
        let scratch = ScratchDir::acquire("item-test").await.unwrap();
        assert!(scratch.path.starts_with(std::env::temp_dir()));
        assert!(tokio::fs::metadata(&scratch.path).await.is_ok());
    }
}
