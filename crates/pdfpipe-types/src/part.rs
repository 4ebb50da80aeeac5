//! Per-item part state owned by the Part Tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PartStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PartStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, PartStatus::Completed | PartStatus::Failed)
    }

    /// `Pending -> Processing -> {Completed|Failed} -> (Pending via retry)`.
    pub fn can_transition_to(self, next: PartStatus) -> bool {
        use PartStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed) | (Failed, Pending)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartState {
    pub status: PartStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl PartState {
    pub fn pending() -> Self {
        Self {
            status: PartStatus::Pending,
            start_time: None,
            end_time: None,
            error: None,
            retry_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartTrackerEntry {
    pub item_id: String,
    pub total_parts: usize,
    pub parts: Vec<PartState>,
    pub aggregate: AggregateStatus,
}

impl PartTrackerEntry {
    pub fn new(item_id: impl Into<String>, total_parts: usize) -> Self {
        Self {
            item_id: item_id.into(),
            total_parts,
            parts: (0..total_parts).map(|_| PartState::pending()).collect(),
            aggregate: AggregateStatus::Pending,
        }
    }

    /// Recomputes `aggregate` from the current part statuses. Deterministic
    /// per the rule in the data model: completed iff all Completed; failed iff
    /// any Failed and nothing Processing/Pending remains; otherwise processing
    /// if anything has started, else pending.
    pub fn recompute_aggregate(&mut self) {
        let total = self.parts.len();
        let completed = self
            .parts
            .iter()
            .filter(|p| p.status == PartStatus::Completed)
            .count();
        let failed = self
            .parts
            .iter()
            .filter(|p| p.status == PartStatus::Failed)
            .count();
        let processing = self
            .parts
            .iter()
            .filter(|p| p.status == PartStatus::Processing)
            .count();
        let pending = self
            .parts
            .iter()
            .filter(|p| p.status == PartStatus::Pending)
            .count();
        debug_assert_eq!(completed + failed + processing + pending, total);

        self.aggregate = if completed == total {
            AggregateStatus::Completed
        } else if failed > 0 && processing == 0 && pending == 0 {
            AggregateStatus::Failed
        } else if processing > 0 || completed > 0 || failed > 0 {
            AggregateStatus::Processing
        } else {
            AggregateStatus::Pending
        };
    }

    pub fn completed_indices(&self) -> Vec<usize> {
        self.indices_with(PartStatus::Completed)
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.indices_with(PartStatus::Failed)
    }

    fn indices_with(&self, status: PartStatus) -> Vec<usize> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.status == status)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn all_completed(&self) -> bool {
        self.aggregate == AggregateStatus::Completed
    }

    pub fn any_failed(&self) -> bool {
        !self.failed_indices().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_all_pending() {
        let entry = PartTrackerEntry::new("item-1", 4);
        assert_eq!(entry.aggregate, AggregateStatus::Pending);
        assert_eq!(entry.parts.len(), 4);
        assert!(entry.parts.iter().all(|p| p.status == PartStatus::Pending));
    }

    #[test]
    fn aggregate_completed_iff_all_parts_completed() {
        let mut entry = PartTrackerEntry::new("item-1", 2);
        entry.parts[0].status = PartStatus::Completed;
        entry.recompute_aggregate();
        assert_eq!(entry.aggregate, AggregateStatus::Processing);
        entry.parts[1].status = PartStatus::Completed;
        entry.recompute_aggregate();
        assert_eq!(entry.aggregate, AggregateStatus::Completed);
        assert!(entry.all_completed());
    }

    #[test]
    fn aggregate_failed_requires_no_pending_or_processing() {
        let mut entry = PartTrackerEntry::new("item-1", 2);
        entry.parts[0].status = PartStatus::Failed;
        entry.recompute_aggregate();
        // part 1 still pending -> not failed yet, still processing/in-flight
        assert_eq!(entry.aggregate, AggregateStatus::Processing);
        entry.parts[1].status = PartStatus::Failed;
        entry.recompute_aggregate();
        assert_eq!(entry.aggregate, AggregateStatus::Failed);
    }

    #[test]
    fn conservation_invariant_holds() {
        let mut entry = PartTrackerEntry::new("item-1", 5);
        entry.parts[0].status = PartStatus::Completed;
        entry.parts[1].status = PartStatus::Failed;
        entry.parts[2].status = PartStatus::Processing;
        entry.recompute_aggregate();
        let total = entry.completed_indices().len()
            + entry.failed_indices().len()
            + entry
                .parts
                .iter()
                .filter(|p| p.status == PartStatus::Processing)
                .count()
            + entry
                .parts
                .iter()
                .filter(|p| p.status == PartStatus::Pending)
                .count();
        assert_eq!(total, entry.total_parts);
    }
}
