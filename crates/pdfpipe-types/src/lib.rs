//! Shared domain types for the distributed PDF-to-Markdown pipeline: the
//! item and part-state data model, the message envelope and event payloads,
//! the retry-decision function, and the port traits external collaborators
//! implement.

pub mod envelope;
pub mod error;
pub mod events;
pub mod item;
pub mod part;
pub mod ports;
pub mod retry;

pub mod prelude {
    pub use crate::envelope::{Envelope, EventType, Priority, DEFAULT_MAX_RETRIES};
    pub use crate::error::{ErrorKind, PipelineError, Result};
    pub use crate::events::*;
    pub use crate::item::{Item, PdfMetadata, ProcessingStatus};
    pub use crate::part::{AggregateStatus, PartState, PartStatus, PartTrackerEntry};
    pub use crate::ports::{ConverterData, ConverterResponse, MetadataStore, ObjectStore, PartTrackerStore, PdfConverter, UploadedObject};
    pub use crate::retry::{decide_retry, RetryDecision};
}
