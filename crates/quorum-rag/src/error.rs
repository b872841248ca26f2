//! Error types for question answering and ingestion.

use quorum_core::QuorumError;
use quorum_vector::RetrievalError;

/// Failure of a generation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Timeouts, rate limits, upstream 5xx. Retried.
    #[error("transient generation failure: {0}")]
    Transient(String),
    /// Not configured, bad credentials, rejected request. Never retried.
    #[error("generation failure: {0}")]
    Permanent(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

/// Failure turning a file or raw text into chunks.
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("no text content to ingest")]
    EmptyInput,
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("failed to read document: {0}")]
    Read(String),
}

impl From<std::io::Error> for IngestionError {
    fn from(err: std::io::Error) -> Self {
        IngestionError::Read(err.to_string())
    }
}

/// Failure of an upload (ingest then store).
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error("storage error: {0}")]
    Storage(#[from] RetrievalError),
}

impl RagError {
    /// Whether the failure was caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RagError::Ingestion(IngestionError::UnsupportedFileType(_))
                | RagError::Ingestion(IngestionError::EmptyInput)
                | RagError::Ingestion(IngestionError::NotFound(_))
        )
    }
}

impl From<RagError> for QuorumError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Ingestion(e) => QuorumError::Ingestion(e.to_string()),
            RagError::Storage(e) => QuorumError::Retrieval(e.to_string()),
        }
    }
}
