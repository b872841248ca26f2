use thiserror::Error;

/// Failure of a retrieval-side operation (embedding, store, search).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// Worth retrying: timeouts, rate limits, upstream 5xx.
    #[error("Transient retrieval failure: {0}")]
    Transient(String),

    /// Not worth retrying: bad credentials, malformed requests, missing setup.
    #[error("Retrieval failure: {0}")]
    Permanent(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl RetrievalError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RetrievalError::Transient(_))
    }

    /// Classify an HTTP status from an upstream service.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status.as_u16(), body);
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            RetrievalError::Transient(message)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            RetrievalError::NotFound(message)
        } else {
            RetrievalError::Permanent(message)
        }
    }
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs may carry credentials.
        let err = err.without_url();
        if err.is_timeout() || err.is_connect() || err.is_request() {
            RetrievalError::Transient(err.to_string())
        } else {
            RetrievalError::Permanent(err.to_string())
        }
    }
}

impl From<RetrievalError> for quorum_core::QuorumError {
    fn from(err: RetrievalError) -> Self {
        quorum_core::QuorumError::Retrieval(err.to_string())
    }
}
