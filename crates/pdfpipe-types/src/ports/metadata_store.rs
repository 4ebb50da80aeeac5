//! Backend-agnostic interface to the item metadata/markdown store.

use async_trait::async_trait;

use crate::error::Result;
use crate::item::Item;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_metadata(&self, item_id: &str) -> Result<Option<Item>>;
    async fn update_metadata(&self, item: &Item) -> Result<()>;
    async fn get_markdown(&self, item_id: &str) -> Result<Option<String>>;
    async fn save_markdown(&self, item_id: &str, content: &str) -> Result<()>;

    /// Writes one part's Markdown into its own `(itemId, partIndex)` slot,
    /// overwriting any prior content for that index. Safe to replay.
    async fn save_markdown_part(&self, item_id: &str, part_index: usize, content: &str) -> Result<()>;

    /// Stored part contents ordered by part index ascending.
    async fn get_markdown_parts(&self, item_id: &str) -> Result<Vec<String>>;
}
