//! The external PDF-to-Markdown converter: one async operation with a loose,
//! dynamically-shaped response. Modeled as a tagged union with an explicit
//! fallback branch per the design notes, rather than leaning on `throw`/`catch`
//! across the boundary the way the original does.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// `data` in the converter response is a string, `{markdown: ...}`,
/// `{content: ...}`, or any other JSON value. `#[serde(untagged)]` tries each
/// variant in order; `Other` is the fallback for anything that doesn't match
/// the two named shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConverterData {
    Markdown { markdown: String },
    Content { content: String },
    Text(String),
    Other(Value),
}

impl ConverterData {
    /// Resolves the markdown text regardless of which shape the converter
    /// returned: named-field variants unwrap directly, anything else is
    /// JSON-stringified, mirroring the external converter's loose contract.
    pub fn into_markdown(self) -> String {
        match self {
            ConverterData::Markdown { markdown } => markdown,
            ConverterData::Content { content } => content,
            ConverterData::Text(text) => text,
            ConverterData::Other(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverterResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<ConverterData>,
    pub task_id: String,
    #[serde(default)]
    pub error: Option<String>,
}

#[async_trait]
pub trait PdfConverter: Send + Sync {
    async fn convert_from_url(&self, presigned_url: &str) -> Result<ConverterResponse>;
}
