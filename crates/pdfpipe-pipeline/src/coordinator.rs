//! Coordinator Worker: consumes analysis outcomes and fans out
//! exactly one downstream message. The only component allowed to transition
//! an item into `Processing`.

use std::sync::Arc;

use pdfpipe_broker::BrokerAdapter;
use pdfpipe_types::prelude::*;
use tracing::info;

pub struct CoordinatorWorker {
    broker: Arc<BrokerAdapter>,
    metadata_store: Arc<dyn MetadataStore>,
}

impl CoordinatorWorker {
    pub fn new(broker: Arc<BrokerAdapter>, metadata_store: Arc<dyn MetadataStore>) -> Self {
        Self { broker, metadata_store }
    }

    pub async fn handle(&self, envelope: Envelope<PdfAnalysisCompleted>) -> Result<()> {
        let item_id = envelope.item_id.clone();
        let payload = envelope.payload;

        let mut item = self
            .metadata_store
            .get_metadata(&item_id)
            .await?
            .ok_or_else(|| PipelineError::ItemNotFound { item_id: item_id.clone() })?;

        item.transition_status(ProcessingStatus::Processing, Some("coordinator dispatched downstream work".into()))
            .map_err(PipelineError::Poison)?;
        self.metadata_store.update_metadata(&item).await?;

        if payload.requires_splitting {
            let request = Envelope::new(
                EventType::PdfSplittingRequest,
                item_id.clone(),
                PdfSplittingRequest {
                    object_key: payload.object_key,
                    page_count: payload.page_count,
                    split_size: payload.suggested_split_size,
                },
            );
            self.broker.publish("pdf.splitting.request", &request, true).await?;
            info!(item_id, "dispatched to splitting worker");
        } else {
            let request = Envelope::new(
                EventType::PdfConversionRequest,
                item_id.clone(),
                PdfConversionRequest { object_key: payload.object_key, metadata: Some(payload.pdf_metadata) },
            );
            self.broker.publish("pdf.conversion.request", &request, true).await?;
            info!(item_id, "dispatched to conversion worker");
        }

        Ok(())
    }
}
