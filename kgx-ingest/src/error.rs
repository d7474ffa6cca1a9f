//! Error types for kgx-ingest
//!
//! Resolution misses, failed batches, grouping anomalies and malformed
//! fragments are not errors: they are counted and logged, and the run
//! completes. [`IngestError`] covers what genuinely stops a run.

use thiserror::Error;

/// Remote lookup service errors
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("API error {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl LookupError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            LookupError::Network(_) | LookupError::Timeout(_) => true,
            LookupError::Status(code, _) => *code == 429 || *code >= 500,
            LookupError::Parse(_) => false,
        }
    }
}

/// Loader error type
#[derive(Debug, Error)]
pub enum IngestError {
    /// Lookup client could not be constructed or used
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// A group key has no entry in the relation table at all (strict mode)
    #[error("No relation declared for group key '{group_key}'")]
    MissingRelation { group_key: String },

    /// The run was cancelled
    #[error("Run cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// kgx-common error
    #[error("Common error: {0}")]
    Common(#[from] kgx_common::Error),
}

/// Result type for loader operations
pub type IngestResult<T> = Result<T, IngestError>;
