use thiserror::Error;

/// Top-level error type for the Quorum service.
///
/// Subsystem crates define their own error types and convert into
/// `QuorumError` at the composition root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuorumError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Call error: {0}")]
    Call(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for QuorumError {
    fn from(err: toml::de::Error) -> Self {
        QuorumError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for QuorumError {
    fn from(err: toml::ser::Error) -> Self {
        QuorumError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for QuorumError {
    fn from(err: serde_json::Error) -> Self {
        QuorumError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Quorum operations.
pub type Result<T> = std::result::Result<T, QuorumError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuorumError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuorumError = io_err.into();
        assert!(matches!(err, QuorumError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let parsed: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let err: QuorumError = parsed.unwrap_err().into();
        assert!(matches!(err, QuorumError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let err: QuorumError = parsed.unwrap_err().into();
        assert!(matches!(err, QuorumError::Serialization(_)));
    }

    #[test]
    fn test_subsystem_variants_display() {
        let cases: Vec<(QuorumError, &str)> = vec![
            (
                QuorumError::Retrieval("qdrant down".into()),
                "Retrieval error: qdrant down",
            ),
            (
                QuorumError::Generation("quota".into()),
                "Generation error: quota",
            ),
            (
                QuorumError::Ingestion("bad pdf".into()),
                "Ingestion error: bad pdf",
            ),
            (QuorumError::Call("no token".into()), "Call error: no token"),
            (QuorumError::Api("bind".into()), "API error: bind"),
        ];
        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }
}
