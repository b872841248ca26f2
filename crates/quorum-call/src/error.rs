//! Error types for call control and event handling.

use quorum_core::QuorumError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("call control not configured: {0}")]
    NotConfigured(String),
    #[error("call platform error: {0}")]
    Upstream(String),
    #[error("malformed call event: {0}")]
    MalformedEvent(String),
    #[error("unknown call: {0}")]
    NotFound(String),
    #[error("voice query failed: {0}")]
    Answer(String),
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        CallError::Upstream(err.to_string())
    }
}

impl From<CallError> for QuorumError {
    fn from(err: CallError) -> Self {
        QuorumError::Call(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_display() {
        assert_eq!(
            CallError::NotConfigured("ACS_ENDPOINT is not set".into()).to_string(),
            "call control not configured: ACS_ENDPOINT is not set"
        );
        assert_eq!(
            CallError::MalformedEvent("missing type".into()).to_string(),
            "malformed call event: missing type"
        );
        assert_eq!(CallError::NotFound("abc".into()).to_string(), "unknown call: abc");
    }

    #[test]
    fn test_into_quorum_error() {
        let err: QuorumError = CallError::Upstream("503".into()).into();
        assert_eq!(err.to_string(), "Call error: call platform error: 503");
    }
}
