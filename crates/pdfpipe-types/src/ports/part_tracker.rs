//! The Part Tracker port: a persistent `itemId -> {totalParts, parts[],
//! aggregate}` map, safe under concurrent updates from multiple conversion
//! workers. Two backends are equivalent and selected at startup; this trait
//! is the shared interface, modeled after the generic `Repository<T>` port
//! pattern used elsewhere in this codebase.

use async_trait::async_trait;

use crate::error::Result;
use crate::part::{PartState, PartStatus, PartTrackerEntry};

#[async_trait]
pub trait PartTrackerStore: Send + Sync {
    /// Atomically replaces any prior entry for `item_id`; creates `total`
    /// parts in `Pending`; aggregate = `pending`.
    async fn initialize(&self, item_id: &str, total: usize) -> Result<()>;

    /// Atomically transitions part `i`. Sets `start_time` on first
    /// transition to `Processing`, `end_time` on any terminal status,
    /// recomputes the aggregate.
    async fn update_part_status(
        &self,
        item_id: &str,
        index: usize,
        status: PartStatus,
        error: Option<String>,
    ) -> Result<()>;

    async fn are_all_parts_completed(&self, item_id: &str) -> Result<bool>;

    async fn has_any_part_failed(&self, item_id: &str) -> Result<bool>;

    async fn get_completed_parts(&self, item_id: &str) -> Result<Vec<usize>>;

    async fn get_failed_parts(&self, item_id: &str) -> Result<Vec<usize>>;

    async fn get_failed_parts_details(&self, item_id: &str) -> Result<Vec<(usize, PartState)>>;

    async fn get_all_part_statuses(&self, item_id: &str) -> Result<Option<PartTrackerEntry>>;

    /// Sets every `Failed` part back to `Pending`, increments its
    /// `retry_count`, clears its `error`, recomputes the aggregate. Returns
    /// the indices that were reset.
    async fn retry_failed_parts(&self, item_id: &str) -> Result<Vec<usize>>;

    /// Deletes the entry entirely.
    async fn cleanup_pdf_processing(&self, item_id: &str) -> Result<()>;
}
