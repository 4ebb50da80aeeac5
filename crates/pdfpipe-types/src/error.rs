//! Unified error taxonomy for the PDF processing pipeline.
//!
//! Mirrors the four error kinds of the error-handling design: transient I/O,
//! bad input, poison messages, and fatal startup errors. Each kind maps to a
//! distinct handling policy in the broker adapter and the retry discipline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("transient I/O error: {0}")]
    Transient(String),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("item not found: {item_id}")]
    ItemNotFound { item_id: String },

    #[error("object not found: {object_key}")]
    ObjectNotFound { object_key: String },

    #[error("converter reported failure: {0}")]
    ConverterFailed(String),

    #[error("poison message: {0}")]
    Poison(String),

    #[error("fatal startup error: {0}")]
    Fatal(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("part tracker error: {0}")]
    Tracker(String),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl PipelineError {
    /// Network/broker/converter-timeout/object-store-5xx class: retry locally.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Transient(_) | PipelineError::Broker(_))
    }

    /// Item/object missing, or a deterministic converter failure: retry once, then fail.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            PipelineError::ItemNotFound { .. }
                | PipelineError::ObjectNotFound { .. }
                | PipelineError::ConverterFailed(_)
        )
    }

    /// Malformed envelope: nack without requeue, never retry.
    pub fn is_poison(&self) -> bool {
        matches!(self, PipelineError::Poison(_) | PipelineError::Serialization(_))
    }

    /// Topology mismatch or unreachable tracker backend at startup: exit non-zero.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Fatal(_))
    }
}

/// The coarse kind used by the retry decision function, decoupled from the
/// concrete error enum so `decide_retry` stays a pure function over simple values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    BadInput,
    Poison,
    Fatal,
}

impl From<&PipelineError> for ErrorKind {
    fn from(err: &PipelineError) -> Self {
        if err.is_poison() {
            ErrorKind::Poison
        } else if err.is_fatal() {
            ErrorKind::Fatal
        } else if err.is_bad_input() {
            ErrorKind::BadInput
        } else {
            ErrorKind::Transient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_classified() {
        let err = PipelineError::Transient("connection reset".into());
        assert!(err.is_transient());
        assert!(!err.is_poison());
    }

    #[test]
    fn bad_input_errors_classified() {
        let err = PipelineError::ItemNotFound { item_id: "x".into() };
        assert!(err.is_bad_input());
        assert!(!err.is_transient());
    }

    #[test]
    fn poison_errors_classified() {
        let err = PipelineError::Poison("unknown eventType".into());
        assert!(err.is_poison());
    }

    #[test]
    fn error_kind_conversion() {
        let err = PipelineError::Fatal("topology mismatch".into());
        assert_eq!(ErrorKind::from(&err), ErrorKind::Fatal);
    }
}
