//! Backend-agnostic interface to the object store holding PDFs and uploaded
//! parts. No production adapter ships in this repo (out of scope per the
//! purpose statement); a deployment wires in its own implementation.

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct UploadedObject {
    pub object_key: String,
    pub url: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload_pdf(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadedObject>;
    async fn get_pdf(&self, object_key: &str) -> Result<Vec<u8>>;
    async fn get_pdf_download_url(&self, object_key: &str) -> Result<String>;
}
