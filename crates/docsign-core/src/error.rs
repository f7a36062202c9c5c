//! Error taxonomy shared by the controller and every backend

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocsignError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocsignError {
    /// Bad user input: blank reason, page out of range, empty signature text
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not legal for the current placement or document status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Another mutating call for the same document is still in flight
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl DocsignError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DocsignError::Transport(_) | DocsignError::Timeout(_))
    }

    /// Stable machine-readable name, used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            DocsignError::Validation(_) => "validation",
            DocsignError::InvalidState(_) => "invalid_state",
            DocsignError::Conflict(_) => "conflict",
            DocsignError::Transport(_) => "transport",
            DocsignError::NotFound(_) => "not_found",
            DocsignError::Timeout(_) => "timeout",
        }
    }

    /// Rebuild an error from its wire `kind` and message. Unknown kinds are
    /// treated as transport failures.
    pub fn from_kind(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "validation" => DocsignError::Validation(message),
            "invalid_state" => DocsignError::InvalidState(message),
            "conflict" => DocsignError::Conflict(message),
            "not_found" => DocsignError::NotFound(message),
            // The server's own deadline; the client has no duration to report
            "timeout" => DocsignError::Transport(format!("server timeout: {}", message)),
            _ => DocsignError::Transport(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(DocsignError::Transport("down".into()).is_retryable());
        assert!(DocsignError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!DocsignError::Validation("reason".into()).is_retryable());
        assert!(!DocsignError::InvalidState("accepted".into()).is_retryable());
        assert!(!DocsignError::Conflict("busy".into()).is_retryable());
        assert!(!DocsignError::NotFound("p-1".into()).is_retryable());
    }

    #[test]
    fn test_kind_roundtrip() {
        for err in [
            DocsignError::Validation("a".into()),
            DocsignError::InvalidState("b".into()),
            DocsignError::Conflict("c".into()),
            DocsignError::Transport("d".into()),
            DocsignError::NotFound("e".into()),
        ] {
            let message = match &err {
                DocsignError::Validation(m)
                | DocsignError::InvalidState(m)
                | DocsignError::Conflict(m)
                | DocsignError::Transport(m)
                | DocsignError::NotFound(m) => m.clone(),
                DocsignError::Timeout(_) => unreachable!(),
            };
            assert_eq!(DocsignError::from_kind(err.kind(), message), err);
        }
    }

    #[test]
    fn test_unknown_kind_is_transport() {
        let err = DocsignError::from_kind("teapot", "short and stout");
        assert!(matches!(err, DocsignError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_timeout_message() {
        let err = DocsignError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Timed out after 1500ms");
    }
}
