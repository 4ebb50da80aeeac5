//! Reconnect backoff policy: exponential backoff starting at 5s,
//! capped at 5 attempts. Kept as a pure function so the schedule is
//! unit-testable without a live connection.

use std::time::Duration;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF_SECS: u64 = 5;

/// Returns the delay before reconnect attempt `attempt` (1-based), or `None`
/// once `attempt` exceeds `MAX_RECONNECT_ATTEMPTS` — the caller should stop
/// and surface `Unhealthy`.
pub fn backoff_for_attempt(attempt: u32) -> Option<Duration> {
    if attempt == 0 || attempt > MAX_RECONNECT_ATTEMPTS {
        return None;
    }
    let secs = INITIAL_BACKOFF_SECS * 2u64.pow(attempt - 1);
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_waits_five_seconds() {
        assert_eq!(backoff_for_attempt(1), Some(Duration::from_secs(5)));
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        assert_eq!(backoff_for_attempt(2), Some(Duration::from_secs(10)));
        assert_eq!(backoff_for_attempt(3), Some(Duration::from_secs(20)));
    }

    #[test]
    fn stops_after_five_attempts() {
        assert!(backoff_for_attempt(5).is_some());
        assert_eq!(backoff_for_attempt(6), None);
    }
}
