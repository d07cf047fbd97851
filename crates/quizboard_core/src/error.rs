//! Error taxonomy shared by every layer of the progression engine.

/// Failure kinds surfaced by the engine.
///
/// `ConflictIgnored` exists so that store code can name a lost duplicate
/// insert explicitly; the engine resolves it as a no-op and never returns it
/// to a caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgressError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict ignored: {0}")]
    ConflictIgnored(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProgressError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ProgressError::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ProgressError::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ProgressError::Internal(msg.into())
    }

    /// Short machine-readable label, used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressError::InvalidInput(_) => "invalid_input",
            ProgressError::NotFound(_) => "not_found",
            ProgressError::ConflictIgnored(_) => "conflict_ignored",
            ProgressError::StoreUnavailable(_) => "store_unavailable",
            ProgressError::Internal(_) => "internal",
        }
    }

    /// Whether the caller may retry the whole operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProgressError::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, ProgressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_unavailable_is_retryable() {
        assert!(ProgressError::StoreUnavailable("busy".into()).is_retryable());
        assert!(!ProgressError::invalid("x").is_retryable());
        assert!(!ProgressError::internal("x").is_retryable());
        assert!(!ProgressError::not_found("x").is_retryable());
    }

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = ProgressError::invalid("user_id is required");
        assert_eq!(err.to_string(), "invalid input: user_id is required");
        assert_eq!(err.kind(), "invalid_input");
    }
}
