//! The fixed broker topology: one topic exchange, one dead-letter
//! exchange, and the fixed queue/routing-key table every adapter declares on
//! start and on reconnect.

pub const MAIN_EXCHANGE: &str = "pdf.conversion";
pub const DEAD_LETTER_EXCHANGE: &str = "dead.letter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSpec {
    pub queue: &'static str,
    pub routing_key: &'static str,
    pub persistent_messages: bool,
}

pub const QUEUES: &[QueueSpec] = &[
    QueueSpec { queue: "pdf-analysis-request", routing_key: "pdf.analysis.request", persistent_messages: true },
    QueueSpec { queue: "pdf-analysis-completed", routing_key: "pdf.analysis.completed", persistent_messages: true },
    QueueSpec { queue: "pdf-analysis-failed", routing_key: "pdf.analysis.failed", persistent_messages: true },
    QueueSpec { queue: "pdf-splitting-request", routing_key: "pdf.splitting.request", persistent_messages: true },
    QueueSpec { queue: "pdf-conversion-request", routing_key: "pdf.conversion.request", persistent_messages: true },
    QueueSpec { queue: "pdf-conversion-progress", routing_key: "pdf.conversion.progress", persistent_messages: false },
    QueueSpec { queue: "pdf-conversion-completed", routing_key: "pdf.conversion.completed", persistent_messages: true },
    QueueSpec { queue: "pdf-conversion-failed", routing_key: "pdf.conversion.failed", persistent_messages: true },
    QueueSpec { queue: "pdf-part-conversion-request", routing_key: "pdf.part.conversion.request", persistent_messages: true },
    QueueSpec { queue: "pdf-part-conversion-completed", routing_key: "pdf.part.conversion.completed", persistent_messages: true },
    QueueSpec { queue: "pdf-part-conversion-failed", routing_key: "pdf.part.conversion.failed", persistent_messages: true },
    QueueSpec { queue: "pdf-merging-request", routing_key: "pdf.merging.request", persistent_messages: true },
    QueueSpec { queue: "pdf-merging-progress", routing_key: "pdf.merging.progress", persistent_messages: false },
    QueueSpec { queue: "markdown-storage-request", routing_key: "markdown.storage.request", persistent_messages: true },
    QueueSpec { queue: "markdown-storage-completed", routing_key: "markdown.storage.completed", persistent_messages: true },
    QueueSpec { queue: "markdown-storage-failed", routing_key: "markdown.storage.failed", persistent_messages: true },
];

pub const DEAD_LETTER_QUEUE: QueueSpec = QueueSpec {
    queue: "dead-letter-queue",
    routing_key: "dead.letter",
    persistent_messages: true,
};

/// Transient (progress) messages expire 300s after being enqueued.
pub const PROGRESS_MESSAGE_TTL_MS: u32 = 300_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_queue_has_a_unique_routing_key() {
        let mut keys: Vec<_> = QUEUES.iter().map(|q| q.routing_key).collect();
        keys.sort_unstable();
        let mut deduped = keys.clone();
        deduped.dedup();
        assert_eq!(keys.len(), deduped.len());
    }

    #[test]
    fn progress_queues_are_transient() {
        let progress: Vec<_> = QUEUES
            .iter()
            .filter(|q| q.queue.ends_with("progress"))
            .collect();
        assert_eq!(progress.len(), 2);
        assert!(progress.iter().all(|q| !q.persistent_messages));
    }
}
