//! In-memory `PartTrackerStore`, used as a reference implementation and by
//! the contract-test suite that exercises both real backends.
//!
//! Concurrency contract: `update_part_status` for distinct indices on the
//! same `item_id` must be linearizable. A per-item lock (one entry in the
//! `DashMap`, guarded individually) satisfies this without needing a
//! cluster-wide conditional write.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use pdfpipe_types::prelude::*;

#[derive(Default)]
pub struct InMemoryPartTracker {
    entries: DashMap<String, Arc<Mutex<PartTrackerEntry>>>,
}

impl InMemoryPartTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PartTrackerStore for InMemoryPartTracker {
    async fn initialize(&self, item_id: &str, total: usize) -> Result<()> {
        self.entries.insert(
            item_id.to_string(),
            Arc::new(Mutex::new(PartTrackerEntry::new(item_id, total))),
        );
        Ok(())
    }

    async fn update_part_status(
        &self,
        item_id: &str,
        index: usize,
        status: PartStatus,
        error: Option<String>,
    ) -> Result<()> {
        let entry = self
            .entries
            .get(item_id)
            .ok_or_else(|| PipelineError::Tracker(format!("no entry for {item_id}")))?
            .clone();
        let mut guard = entry.lock();
        let part = guard
            .parts
            .get_mut(index)
            .ok_or_else(|| PipelineError::Tracker(format!("index {index} out of range for {item_id}")))?;

        if !part.status.can_transition_to(status) {
            return Err(PipelineError::Tracker(format!(
                "illegal part transition {:?} -> {:?} for {item_id}[{index}]",
                part.status, status
            )));
        }

        if status == PartStatus::Processing && part.start_time.is_none() {
            part.start_time = Some(Utc::now());
        }
        if status.is_terminal() {
            part.end_time = Some(Utc::now());
        }
        part.status = status;
        part.error = error;
        guard.recompute_aggregate();
        Ok(())
    }

    async fn are_all_parts_completed(&self, item_id: &str) -> Result<bool> {
        Ok(self
            .entries
            .get(item_id)
            .map(|e| e.lock().all_completed())
            .unwrap_or(false))
    }

    async fn has_any_part_failed(&self, item_id: &str) -> Result<bool> {
        Ok(self
            .entries
            .get(item_id)
            .map(|e| e.lock().any_failed())
            .unwrap_or(false))
    }

    async fn get_completed_parts(&self, item_id: &str) -> Result<Vec<usize>> {
        Ok(self
            .entries
            .get(item_id)
            .map(|e| e.lock().completed_indices())
            .unwrap_or_default())
    }

    async fn get_failed_parts(&self, item_id: &str) -> Result<Vec<usize>> {
        Ok(self
            .entries
            .get(item_id)
            .map(|e| e.lock().failed_indices())
            .unwrap_or_default())
    }

    async fn get_failed_parts_details(&self, item_id: &str) -> Result<Vec<(usize, PartState)>> {
        Ok(self
            .entries
            .get(item_id)
            .map(|e| {
                let guard = e.lock();
                guard
                    .failed_indices()
                    .into_iter()
                    .map(|i| (i, guard.parts[i].clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_all_part_statuses(&self, item_id: &str) -> Result<Option<PartTrackerEntry>> {
        Ok(self.entries.get(item_id).map(|e| e.lock().clone()))
    }

    async fn retry_failed_parts(&self, item_id: &str) -> Result<Vec<usize>> {
        let entry = self
            .entries
            .get(item_id)
            .ok_or_else(|| PipelineError::Tracker(format!("no entry for {item_id}")))?
            .clone();
        let mut guard = entry.lock();
        let mut reset = Vec::new();
        for (i, part) in guard.parts.iter_mut().enumerate() {
            if part.status == PartStatus::Failed {
                part.status = PartStatus::Pending;
                part.retry_count += 1;
                part.error = None;
                part.start_time = None;
                part.end_time = None;
                reset.push(i);
            }
        }
        guard.recompute_aggregate();
        Ok(reset)
    }

    async fn cleanup_pdf_processing(&self, item_id: &str) -> Result<()> {
        self.entries.remove(item_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_creates_all_pending_parts() {
        let tracker = InMemoryPartTracker::new();
        tracker.initialize("item-1", 3).await.unwrap();
        let entry = tracker.get_all_part_statuses("item-1").await.unwrap().unwrap();
        assert_eq!(entry.total_parts, 3);
        assert!(entry.parts.iter().all(|p| p.status == PartStatus::Pending));
    }

    #[tokio::test]
    async fn reinitializing_resets_to_m_parts_all_pending() {
        let tracker = InMemoryPartTracker::new();
        tracker.initialize("item-1", 3).await.unwrap();
        tracker
            .update_part_status("item-1", 0, PartStatus::Processing, None)
            .await
            .unwrap();
        tracker.initialize("item-1", 5).await.unwrap();
        let entry = tracker.get_all_part_statuses("item-1").await.unwrap().unwrap();
        assert_eq!(entry.total_parts, 5);
        assert!(entry.parts.iter().all(|p| p.status == PartStatus::Pending));
    }

    #[tokio::test]
    async fn all_completed_only_once_every_part_completes() {
        let tracker = InMemoryPartTracker::new();
        tracker.initialize("item-1", 2).await.unwrap();
        tracker.update_part_status("item-1", 0, PartStatus::Processing, None).await.unwrap();
        tracker.update_part_status("item-1", 0, PartStatus::Completed, None).await.unwrap();
        assert!(!tracker.are_all_parts_completed("item-1").await.unwrap());
        tracker.update_part_status("item-1", 1, PartStatus::Processing, None).await.unwrap();
        tracker.update_part_status("item-1", 1, PartStatus::Completed, None).await.unwrap();
        assert!(tracker.are_all_parts_completed("item-1").await.unwrap());
    }

    #[tokio::test]
    async fn retry_failed_parts_resets_to_pending_and_bumps_retry_count() {
        let tracker = InMemoryPartTracker::new();
        tracker.initialize("item-1", 2).await.unwrap();
        tracker.update_part_status("item-1", 0, PartStatus::Processing, None).await.unwrap();
        tracker
            .update_part_status("item-1", 0, PartStatus::Failed, Some("converter timeout".into()))
            .await
            .unwrap();
        let reset = tracker.retry_failed_parts("item-1").await.unwrap();
        assert_eq!(reset, vec![0]);
        let entry = tracker.get_all_part_statuses("item-1").await.unwrap().unwrap();
        assert_eq!(entry.parts[0].status, PartStatus::Pending);
        assert_eq!(entry.parts[0].retry_count, 1);
        assert!(entry.parts[0].error.is_none());
    }

    #[tokio::test]
    async fn cleanup_deletes_the_entry() {
        let tracker = InMemoryPartTracker::new();
        tracker.initialize("item-1", 1).await.unwrap();
        tracker.cleanup_pdf_processing("item-1").await.unwrap();
        assert!(tracker.get_all_part_statuses("item-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_updates_to_distinct_parts_are_linearizable() {
        let tracker = Arc::new(InMemoryPartTracker::new());
        tracker.initialize("item-1", 2).await.unwrap();
        tracker.update_part_status("item-1", 0, PartStatus::Processing, None).await.unwrap();
        tracker.update_part_status("item-1", 1, PartStatus::Processing, None).await.unwrap();

        let t1 = tracker.clone();
        let t2 = tracker.clone();
        let a = tokio::spawn(async move { t1.update_part_status("item-1", 0, PartStatus::Completed, None).await });
        let b = tokio::spawn(async move { t2.update_part_status("item-1", 1, PartStatus::Completed, None).await });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert!(tracker.are_all_parts_completed("item-1").await.unwrap());
    }
}
