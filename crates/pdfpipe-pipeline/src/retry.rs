//! Shared retry-publish helper, used by every worker so the retry
//! discipline is expressed once instead of once per handler.

use std::sync::Arc;

use pdfpipe_broker::BrokerAdapter;
use pdfpipe_types::prelude::*;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::metrics::PipelineMetrics;

pub struct RetryTarget {
    pub retry_routing_key: &'static str,
    pub failed_routing_key: &'static str,
    pub failed_event: EventType,
}

/// On handler failure: republish the same envelope with `retryCount`
/// incremented while under `maxRetries`, else publish the `…Failed` event
/// built by `failed_payload(can_retry)`. Poison/Fatal errors bypass both and
/// are returned to the caller so the broker adapter nacks without requeue.
pub async fn publish_failure_or_retry<T>(
    broker: &Arc<BrokerAdapter>,
    metrics: &Arc<PipelineMetrics>,
    envelope: &Envelope<T>,
    target: RetryTarget,
    err: &PipelineError,
    failed_payload: impl FnOnce(bool) -> Value,
) -> Result<()>
where
    T: Serialize + Clone + Send + Sync,
{
    let kind = ErrorKind::from(err);
    if matches!(kind, ErrorKind::Poison | ErrorKind::Fatal) {
        metrics.record_dead_lettered();
        return Err(PipelineError::Poison(err.to_string()));
    }

    match decide_retry(envelope.retry_count, envelope.max_retries, kind) {
        RetryDecision::Retry => {
            let retry = envelope.next_retry();
            warn!(
                item_id = %retry.item_id,
                retry_count = retry.retry_count,
                error = %err,
                "retrying after handler failure"
            );
            metrics.record_retry_published();
            broker.publish(target.retry_routing_key, &retry, true).await
        }
        RetryDecision::Fail => {
            error!(item_id = %envelope.item_id, error = %err, "retries exhausted, publishing failure");
            let payload = failed_payload(false);
            let mut failed = Envelope::new(target.failed_event, envelope.item_id.clone(), payload)
                .with_max_retries(envelope.max_retries);
            failed.retry_count = envelope.max_retries;
            broker.publish(target.failed_routing_key, &failed, true).await
        }
        RetryDecision::DeadLetter => {
            metrics.record_dead_lettered();
            Err(PipelineError::Poison(err.to_string()))
        }
    }
}
