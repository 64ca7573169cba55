//! Error types for HDT scoring

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Malformed activity batch for {data_source}: {message}")]
    MalformedBatch { data_source: String, message: String },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unknown metric key '{key}' in {domain} overview")]
    UnknownMetric { domain: &'static str, key: String },

    #[error("Missing metric key '{key}' in {domain} overview")]
    MissingMetric { domain: &'static str, key: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl ComputeError {
    /// Configuration errors indicate the extractor and scorer drifted apart.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ComputeError::UnknownMetric { .. } | ComputeError::MissingMetric { .. }
        )
    }
}

impl From<std::io::Error> for ComputeError {
    fn from(e: std::io::Error) -> Self {
        ComputeError::StorageError(e.to_string())
    }
}
