//! Event-specific payload structs, paired with `Envelope<T>` from
//! [`crate::envelope`] to form a complete message.

use serde::{Deserialize, Serialize};

use crate::item::PdfMetadata;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfAnalysisRequest {
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfAnalysisCompleted {
    pub page_count: u32,
    pub requires_splitting: bool,
    pub suggested_split_size: u32,
    pub pdf_metadata: PdfMetadata,
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfAnalysisFailed {
    pub error: String,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfSplittingRequest {
    pub object_key: String,
    pub page_count: u32,
    pub split_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfConversionRequest {
    pub object_key: String,
    pub metadata: Option<PdfMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfConversionProgress {
    pub progress: u8,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversionMetadata {
    pub processing_time_ms: u64,
    #[serde(default)]
    pub part_index: Option<usize>,
    #[serde(default)]
    pub is_part: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfConversionCompleted {
    pub status: String,
    pub markdown_content: String,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfConversionFailed {
    pub error: String,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfPartConversionRequest {
    pub object_key: String,
    pub part_index: usize,
    pub total_parts: usize,
    pub start_page: u32,
    pub end_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfPartConversionCompleted {
    pub part_index: usize,
    pub total_parts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfPartConversionFailed {
    pub part_index: usize,
    pub error: String,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfMergingRequest {
    pub total_parts: usize,
    pub completed_parts: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PdfMergingProgress {
    pub progress: u8,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownStorageRequest {
    pub markdown_content: String,
    pub metadata: ConversionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownStorageCompleted {
    #[serde(default)]
    pub is_part: bool,
    #[serde(default)]
    pub part_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownStorageFailed {
    pub error: String,
    pub can_retry: bool,
}
