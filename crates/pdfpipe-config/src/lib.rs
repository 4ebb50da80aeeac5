//! Process-wide configuration for the pipeline: loaded from
//! `PDFPIPE_`-prefixed environment variables, with CLI flags overriding
//! individual values for local/manual runs.

pub mod env;

use clap::Parser;

use env::{EnvConfigLoader, EnvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartTrackerBackend {
    Document,
    SearchIndex,
}

impl std::str::FromStr for PartTrackerBackend {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(PartTrackerBackend::Document),
            "search-index" => Ok(PartTrackerBackend::SearchIndex),
            other => Err(EnvError::InvalidValue {
                var: "PART_TRACKER_BACKEND".into(),
                reason: format!("unknown backend '{other}', expected 'document' or 'search-index'"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub split_threshold: u32,
    pub suggested_split_size: u32,
    pub concurrent_part_processing: u32,
    pub max_retries: u32,
    pub converter_timeout_ms: u64,
    pub converter_endpoint: String,
    pub broker_url: String,
    pub dlx_name: String,
    pub part_tracker_backend: PartTrackerBackend,
    pub part_tracker_mongo_uri: String,
    pub part_tracker_mongo_database: String,
    pub part_tracker_index_path: String,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, EnvError> {
        let loader = EnvConfigLoader::new()
            .with_prefix("PDFPIPE_")
            .default("split_threshold", "50")
            .default("suggested_split_size", "25")
            .default("concurrent_part_processing", "4")
            .default("max_retries", "3")
            .default("converter_timeout_ms", "60000")
            .default("converter_endpoint", "http://127.0.0.1:8088/convert")
            .default("broker_url", "amqp://127.0.0.1:5672/%2f")
            .default("dlx_name", "dead.letter")
            .default("part_tracker_backend", "document")
            .default("part_tracker_mongo_uri", "mongodb://127.0.0.1:27017")
            .default("part_tracker_mongo_database", "pdfpipe")
            .default("part_tracker_index_path", "./pdfpipe-part-tracker-index");

        Ok(PipelineConfig {
            split_threshold: loader.get_u32("split_threshold")?,
            suggested_split_size: loader.get_u32("suggested_split_size")?,
            concurrent_part_processing: loader.get_u32("concurrent_part_processing")?,
            max_retries: loader.get_u32("max_retries")?,
            converter_timeout_ms: loader.get_u64("converter_timeout_ms")?,
            converter_endpoint: loader.get("converter_endpoint")?,
            broker_url: loader.get("broker_url")?,
            dlx_name: loader.get("dlx_name")?,
            part_tracker_backend: loader.get("part_tracker_backend")?.parse()?,
            part_tracker_mongo_uri: loader.get("part_tracker_mongo_uri")?,
            part_tracker_mongo_database: loader.get("part_tracker_mongo_database")?,
            part_tracker_index_path: loader.get("part_tracker_index_path")?,
        })
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            split_threshold: 50,
            suggested_split_size: 25,
            concurrent_part_processing: 4,
            max_retries: 3,
            converter_timeout_ms: 60_000,
            converter_endpoint: "http://127.0.0.1:8088/convert".to_string(),
            broker_url: "amqp://127.0.0.1:5672/%2f".to_string(),
            dlx_name: "dead.letter".to_string(),
            part_tracker_backend: PartTrackerBackend::Document,
            part_tracker_mongo_uri: "mongodb://127.0.0.1:27017".to_string(),
            part_tracker_mongo_database: "pdfpipe".to_string(),
            part_tracker_index_path: "./pdfpipe-part-tracker-index".to_string(),
        }
    }
}

/// CLI override flags for local/manual runs, mirroring the worker binary's
/// `clap::Parser` args, applied on top of `PipelineConfig::from_env()`.
#[derive(Parser, Debug)]
#[command(name = "pdfpipe", about = "Distributed PDF-to-Markdown processing pipeline")]
pub struct CliArgs {
    #[arg(long)]
    pub broker_url: Option<String>,

    #[arg(long)]
    pub split_threshold: Option<u32>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    #[arg(long)]
    pub part_tracker_backend: Option<String>,

    #[arg(long)]
    pub converter_endpoint: Option<String>,
}

impl CliArgs {
    pub fn apply_to(&self, mut config: PipelineConfig) -> Result<PipelineConfig, EnvError> {
        if let Some(url) = &self.broker_url {
            config.broker_url = url.clone();
        }
        if let Some(threshold) = self.split_threshold {
            config.split_threshold = threshold;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(backend) = &self.part_tracker_backend {
            config.part_tracker_backend = backend.parse()?;
        }
        if let Some(endpoint) = &self.converter_endpoint {
            config.converter_endpoint = endpoint.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.split_threshold, 50);
        assert_eq!(config.suggested_split_size, 25);
        assert_eq!(config.concurrent_part_processing, 4);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.converter_timeout_ms, 60_000);
        assert_eq!(config.part_tracker_backend, PartTrackerBackend::Document);
    }

    #[test]
    fn cli_args_override_selected_fields_only() {
        let config = PipelineConfig::default();
        let args = CliArgs {
            broker_url: Some("amqp://example:5672".to_string()),
            split_threshold: None,
            max_retries: Some(5),
            part_tracker_backend: None,
            converter_endpoint: None,
        };
        let merged = args.apply_to(config).unwrap();
        assert_eq!(merged.broker_url, "amqp://example:5672");
        assert_eq!(merged.max_retries, 5);
        assert_eq!(merged.split_threshold, 50);
    }

    #[test]
    fn unknown_backend_name_is_rejected() {
        assert!("nonsense".parse::<PartTrackerBackend>().is_err());
    }
}
