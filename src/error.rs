use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors produced by the ingestion and retrieval pipelines
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or invalid configuration, fatal at startup
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The ingestion root directory does not exist
    #[error("input directory not found: {}", .0.display())]
    MissingInputDirectory(PathBuf),

    /// File extension with no registered extractor
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// A single file could not be read or parsed; ingestion skips it
    #[error("failed to extract {}: {}", .path.display(), .message)]
    Extraction { path: PathBuf, message: String },

    /// The ingestion run produced no usable index entries
    #[error("ingestion failed: {0}")]
    IngestionFailed(String),

    /// Empty or whitespace-only question, rejected before any service call
    #[error("query is empty")]
    InvalidQuery,

    /// Embedding service request failed
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// Generative synthesis service request failed
    #[error("synthesis service error: {0}")]
    SynthesisService(String),

    /// Vector index read or write failed
    #[error("vector index error: {0}")]
    Index(String),

    /// Terminal or filesystem I/O failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn extraction(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }
}
