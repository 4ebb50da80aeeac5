//! The `Item` aggregate: the unit of work flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ProcessingStatus {
    Pending,
    Analyzing,
    Splitting,
    Processing,
    Merging,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// True if `self -> next` is a legal step on the success path, or a
    /// transition into/out of `Failed` as allowed by the item invariant.
    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        if next == Failed {
            return self != Completed;
        }
        match (self, next) {
            (Pending, Analyzing) => true,
            (Analyzing, Splitting) | (Analyzing, Processing) => true,
            (Splitting, Processing) => true,
            (Processing, Merging) | (Processing, Completed) => true,
            (Merging, Completed) => true,
            (Failed, Analyzing) | (Failed, Processing) => true,
            (a, b) if a == b => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub page_count: u32,
    pub file_size: u64,
    pub title: Option<String>,
    pub author: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: String,
    pub object_key: String,
    pub processing_status: ProcessingStatus,
    pub processing_message: Option<String>,
    pub processing_error: Option<String>,
    pub processing_progress: u8,
    pub retry_count: u32,
    pub merging_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,
    pub pdf_metadata: Option<PdfMetadata>,
}

impl Item {
    pub fn new(item_id: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            object_key: object_key.into(),
            processing_status: ProcessingStatus::Pending,
            processing_message: None,
            processing_error: None,
            processing_progress: 0,
            retry_count: 0,
            merging_started_at: None,
            completed_at: None,
            modified_at: Utc::now(),
            pdf_metadata: None,
        }
    }

    /// Applies a status transition, validating it against the invariant.
    /// Returns the previous status on success.
    pub fn transition_status(
        &mut self,
        next: ProcessingStatus,
        message: Option<String>,
    ) -> Result<ProcessingStatus, String> {
        if !self.processing_status.can_transition_to(next) {
            return Err(format!(
                "illegal item transition {:?} -> {:?}",
                self.processing_status, next
            ));
        }
        let prev = self.processing_status;
        self.processing_status = next;
        self.processing_message = message;
        self.modified_at = Utc::now();
        Ok(prev)
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.processing_status = ProcessingStatus::Failed;
        self.processing_error = Some(error.into());
        self.modified_at = Utc::now();
    }

    pub fn mark_completed(&mut self) {
        self.processing_status = ProcessingStatus::Completed;
        self.processing_progress = 100;
        self.completed_at = Some(Utc::now());
        self.modified_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_path_transitions_are_legal() {
        let mut item = Item::new("item-1", "obj-1");
        assert!(item
            .transition_status(ProcessingStatus::Analyzing, None)
            .is_ok());
        assert!(item
            .transition_status(ProcessingStatus::Processing, None)
            .is_ok());
        assert!(item
            .transition_status(ProcessingStatus::Merging, None)
            .is_ok());
        assert!(item
            .transition_status(ProcessingStatus::Completed, None)
            .is_ok());
    }

    #[test]
    fn failed_reachable_from_any_non_terminal_state() {
        let mut item = Item::new("item-1", "obj-1");
        item.transition_status(ProcessingStatus::Analyzing, None)
            .unwrap();
        assert!(item
            .transition_status(ProcessingStatus::Failed, Some("boom".into()))
            .is_ok());
    }

    #[test]
    fn failed_cannot_follow_completed() {
        let mut item = Item::new("item-1", "obj-1");
        item.mark_completed();
        assert!(!item
            .processing_status
            .can_transition_to(ProcessingStatus::Failed));
    }

    #[test]
    fn failed_may_re_enter_analyzing_or_processing() {
        let mut item = Item::new("item-1", "obj-1");
        item.mark_failed("transient");
        assert!(item
            .transition_status(ProcessingStatus::Analyzing, None)
            .is_ok());
    }

    #[test]
    fn skipping_splitting_to_processing_is_legal() {
        let mut item = Item::new("item-1", "obj-1");
        item.transition_status(ProcessingStatus::Analyzing, None)
            .unwrap();
        assert!(item
            .transition_status(ProcessingStatus::Processing, None)
            .is_ok());
    }
}
