//! The distributed PDF-to-Markdown processing pipeline: five cooperating
//! workers plus the Merger, wired onto a durable message broker by
//! [`service::PipelineService`].

pub mod analyzer;
pub mod conversion;
pub mod coordinator;
pub mod merge_worker;
pub mod merger;
pub mod metrics;
pub mod retry;
pub mod service;
pub mod splitting;
pub mod storage;

pub mod prelude {
    pub use crate::analyzer::AnalyzerWorker;
    pub use crate::conversion::ConversionWorker;
    pub use crate::coordinator::CoordinatorWorker;
    pub use crate::merge_worker::MergerWorker;
    pub use crate::metrics::{MetricsSnapshot, PipelineMetrics};
    pub use crate::service::{HealthStatus, PipelineService};
    pub use crate::splitting::SplittingWorker;
    pub use crate::storage::MarkdownStorageWorker;
}
