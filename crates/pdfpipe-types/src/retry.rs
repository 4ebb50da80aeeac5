//! Pure retry-decision function shared by every worker, kept free of any I/O
//! so it is testable without a broker.

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Republish with `retryCount` incremented, fresh `messageId`/`timestamp`.
    Retry,
    /// Publish the corresponding `…Failed` event with `canRetry=false`.
    Fail,
    /// Route straight to the dead-letter queue, no retry, no `…Failed` event.
    DeadLetter,
}

/// `decideRetry(retryCount, maxRetries, errorKind)` from the design notes.
///
/// Poison messages never retry: they go straight to the DLQ. Fatal errors
/// are not decided here at all — they fail process startup before any
/// message is consumed — but are included for completeness and map to
/// `DeadLetter` rather than panicking if one reaches this function.
pub fn decide_retry(retry_count: u32, max_retries: u32, kind: ErrorKind) -> RetryDecision {
    match kind {
        ErrorKind::Poison => RetryDecision::DeadLetter,
        ErrorKind::Fatal => RetryDecision::DeadLetter,
        ErrorKind::Transient | ErrorKind::BadInput => {
            if retry_count < max_retries {
                RetryDecision::Retry
            } else {
                RetryDecision::Fail
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_while_under_max() {
        assert_eq!(
            decide_retry(0, 3, ErrorKind::Transient),
            RetryDecision::Retry
        );
        assert_eq!(
            decide_retry(2, 3, ErrorKind::Transient),
            RetryDecision::Retry
        );
    }

    #[test]
    fn fails_at_max_retries() {
        assert_eq!(decide_retry(3, 3, ErrorKind::Transient), RetryDecision::Fail);
        assert_eq!(decide_retry(3, 3, ErrorKind::BadInput), RetryDecision::Fail);
    }

    #[test]
    fn poison_never_retries() {
        assert_eq!(
            decide_retry(0, 3, ErrorKind::Poison),
            RetryDecision::DeadLetter
        );
    }
}
