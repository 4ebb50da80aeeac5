//! In-memory reference implementations of the object store and the
//! metadata/markdown store, used for local development and the end-to-end
//! scenario tests. A real deployment supplies its own adapters behind
//! the same `ObjectStore`/`MetadataStore` ports.

use async_trait::async_trait;
use dashmap::DashMap;

use pdfpipe_types::prelude::*;

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/dev seam: pre-populate an object without going through `upload_pdf`.
    pub fn seed(&self, object_key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.insert(object_key.into(), bytes);
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn upload_pdf(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadedObject> {
        let object_key = format!("{}-{}", uuid::Uuid::new_v4(), filename);
        let url = format!("memory://{object_key}");
        self.objects.insert(object_key.clone(), bytes);
        Ok(UploadedObject { object_key, url })
    }

    async fn get_pdf(&self, object_key: &str) -> Result<Vec<u8>> {
        self.objects
            .get(object_key)
            .map(|entry| entry.clone())
            .ok_or_else(|| PipelineError::ObjectNotFound { object_key: object_key.to_string() })
    }

    async fn get_pdf_download_url(&self, object_key: &str) -> Result<String> {
        if self.objects.contains_key(object_key) {
            Ok(format!("memory://{object_key}"))
        } else {
            Err(PipelineError::ObjectNotFound { object_key: object_key.to_string() })
        }
    }
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    items: DashMap<String, Item>,
    markdown: DashMap<String, String>,
    markdown_parts: DashMap<String, DashMap<usize, String>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, item: Item) {
        self.items.insert(item.item_id.clone(), item);
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get_metadata(&self, item_id: &str) -> Result<Option<Item>> {
        Ok(self.items.get(item_id).map(|e| e.clone()))
    }

    async fn update_metadata(&self, item: &Item) -> Result<()> {
        self.items.insert(item.item_id.clone(), item.clone());
        Ok(())
    }

    async fn get_markdown(&self, item_id: &str) -> Result<Option<String>> {
        Ok(self.markdown.get(item_id).map(|e| e.clone()))
    }

    async fn save_markdown(&self, item_id: &str, content: &str) -> Result<()> {
        self.markdown.insert(item_id.to_string(), content.to_string());
        Ok(())
    }

    async fn save_markdown_part(&self, item_id: &str, part_index: usize, content: &str) -> Result<()> {
        self.markdown_parts
            .entry(item_id.to_string())
            .or_default()
            .insert(part_index, content.to_string());
        Ok(())
    }

    async fn get_markdown_parts(&self, item_id: &str) -> Result<Vec<String>> {
        let Some(parts) = self.markdown_parts.get(item_id) else {
            return Ok(Vec::new());
        };
        let mut indexed: Vec<(usize, String)> = parts.iter().map(|e| (*e.key(), e.value().clone())).collect();
        indexed.sort_by_key(|(index, _)| *index);
        Ok(indexed.into_iter().map(|(_, content)| content).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_download_round_trips_bytes() {
        let store = InMemoryObjectStore::new();
        let uploaded = store.upload_pdf(vec![1, 2, 3], "doc.pdf").await.unwrap();
        let fetched = store.get_pdf(&uploaded.object_key).await.unwrap();
        assert_eq!(fetched, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_object_is_reported() {
        let store = InMemoryObjectStore::new();
        assert!(store.get_pdf("nonexistent").await.is_err());
    }

    #[tokio::test]
    async fn save_markdown_is_idempotent_on_replay() {
        let store = InMemoryMetadataStore::new();
        store.save_markdown("item-1", "first").await.unwrap();
        store.save_markdown("item-1", "second").await.unwrap();
        assert_eq!(store.get_markdown("item-1").await.unwrap().unwrap(), "second");
    }

    #[tokio::test]
    async fn save_markdown_part_replay_overwrites_its_own_slot() {
        let store = InMemoryMetadataStore::new();
        store.save_markdown_part("item-1", 1, "part two").await.unwrap();
        store.save_markdown_part("item-1", 0, "part one").await.unwrap();
        store.save_markdown_part("item-1", 1, "part two").await.unwrap();

        let parts = store.get_markdown_parts("item-1").await.unwrap();
        assert_eq!(parts, vec!["part one".to_string(), "part two".to_string()]);
    }
}
