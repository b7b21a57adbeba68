//! Error types for the conversational decision layer.
//!
//! Only request validation and structural strategy failures reach callers;
//! backend problems in classification, scoring and refinement are
//! downgraded at the component boundary.

use concierge_core::error::ConciergeError;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("backend timed out after {0} ms")]
    BackendTimeout(u64),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("{strategy} strategy returned malformed output: {detail}")]
    MalformedStrategyOutput {
        strategy: &'static str,
        detail: String,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("session store error: {0}")]
    SessionStore(String),
}

impl From<ConciergeError> for ChatError {
    fn from(err: ConciergeError) -> Self {
        ChatError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::Disabled;
        assert_eq!(err.to_string(), "chat is disabled");

        let err = ChatError::EmptyMessage;
        assert_eq!(err.to_string(), "message cannot be empty");

        let err = ChatError::MessageTooLong(2000);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 2000 characters"
        );

        let err = ChatError::SessionNotFound("guest-42".to_string());
        assert_eq!(err.to_string(), "session not found: guest-42");

        let err = ChatError::Backend("connection refused".to_string());
        assert_eq!(err.to_string(), "backend error: connection refused");

        let err = ChatError::BackendTimeout(2000);
        assert_eq!(err.to_string(), "backend timed out after 2000 ms");

        let err = ChatError::Retrieval("index offline".to_string());
        assert_eq!(err.to_string(), "retrieval error: index offline");
    }

    #[test]
    fn test_malformed_strategy_output_is_actionable() {
        let err = ChatError::MalformedStrategyOutput {
            strategy: "reasoning",
            detail: "missing field `answer`; the backend must reply with a JSON object".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("reasoning strategy returned malformed output"));
        assert!(msg.contains("missing field `answer`"));
    }

    #[test]
    fn test_chat_error_from_concierge_error() {
        let err: ChatError = ConciergeError::Registry("duplicate cottage 3".to_string()).into();
        assert!(matches!(err, ChatError::Config(_)));
        assert!(err.to_string().contains("duplicate cottage 3"));
    }

    #[test]
    fn test_errors_implement_debug() {
        let dbg = format!("{:?}", ChatError::MessageTooLong(1));
        assert!(dbg.contains("MessageTooLong"));
    }
}
