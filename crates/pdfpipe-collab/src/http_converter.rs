//! HTTP-backed implementation of the external PDF converter port:
//! one POST carrying the presigned URL, a 60s outer timeout, and the
//! tagged-union response shape handled by `ConverterData`.

use async_trait::async_trait;
use std::time::Duration;

use pdfpipe_types::prelude::*;

pub struct HttpPdfConverter {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpPdfConverter {
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[async_trait]
impl PdfConverter for HttpPdfConverter {
    async fn convert_from_url(&self, presigned_url: &str) -> Result<ConverterResponse> {
        let response = tokio::time::timeout(
            self.timeout,
            self.client
                .post(&self.endpoint)
                .json(&serde_json::json!({ "url": presigned_url }))
                .send(),
        )
        .await
        .map_err(|_| PipelineError::Transient(format!("converter call to {} timed out", self.endpoint)))?
        .map_err(|e| PipelineError::Transient(format!("converter request failed: {e}")))?;

        let body: ConverterResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Transient(format!("converter response decode failed: {e}")))?;

        Ok(body)
    }
}
