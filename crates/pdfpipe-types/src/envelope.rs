//! The message envelope carried by every message on the broker, and the
//! closed set of event types that populate its `event_type` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    /// `{low→1, normal→5, high→10}`, used as the broker's publish-option priority.
    pub fn broker_priority(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 5,
            Priority::High => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    PdfAnalysisRequest,
    PdfAnalysisCompleted,
    PdfAnalysisFailed,
    PdfSplittingRequest,
    PdfConversionRequest,
    PdfConversionProgress,
    PdfConversionCompleted,
    PdfConversionFailed,
    PdfPartConversionRequest,
    PdfPartConversionCompleted,
    PdfPartConversionFailed,
    PdfMergingRequest,
    PdfMergingProgress,
    MarkdownStorageRequest,
    MarkdownStorageCompleted,
    MarkdownStorageFailed,
}

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The envelope shared by every message. Event-specific fields live in the
/// `payload` value, kept as untyped JSON at this layer so the envelope can be
/// deserialized before the concrete payload shape is known (the broker
/// adapter reads `event_type` first, then dispatches to a typed payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub message_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub item_id: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(flatten)]
    pub payload: T,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl<T> Envelope<T> {
    pub fn new(event_type: EventType, item_id: impl Into<String>, payload: T) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            item_id: item_id.into(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            priority: Priority::Normal,
            payload,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builds the next retry attempt: fresh `messageId`/`timestamp`,
    /// `retryCount` incremented, every other field untouched.
    pub fn next_retry(&self) -> Self
    where
        T: Clone,
    {
        Self {
            message_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        value: u32,
    }

    #[test]
    fn new_envelope_has_zero_retry_count_and_default_max_retries() {
        let env = Envelope::new(EventType::PdfAnalysisRequest, "item-1", Dummy { value: 1 });
        assert_eq!(env.retry_count, 0);
        assert_eq!(env.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn next_retry_regenerates_id_and_timestamp_and_bumps_count() {
        let env = Envelope::new(EventType::PdfConversionRequest, "item-1", Dummy { value: 1 });
        let retry = env.next_retry();
        assert_ne!(env.message_id, retry.message_id);
        assert_eq!(retry.retry_count, 1);
        assert_eq!(retry.item_id, env.item_id);
        assert_eq!(retry.payload, env.payload);
    }

    #[test]
    fn priority_maps_to_broker_priority() {
        assert_eq!(Priority::Low.broker_priority(), 1);
        assert_eq!(Priority::Normal.broker_priority(), 5);
        assert_eq!(Priority::High.broker_priority(), 10);
    }
}
