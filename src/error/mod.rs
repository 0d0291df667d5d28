use thiserror::Error;

use crate::preference::{Channel, NotificationType};
use crate::provider::ProviderError;

/// Engine-wide error type.
///
/// Every fallible operation in the engine resolves to one of these kinds.
/// `Provider` errors raised during a scheduled attempt are recovered by the
/// scheduler's retry policy; all other kinds propagate unmodified to the
/// caller.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Delivery blocked by preference: user={user_id} type={notification_type} channel={channel}")]
    PreferenceDenied {
        user_id: String,
        notification_type: NotificationType,
        channel: Channel,
    },

    #[error("Operation '{operation}' not valid in status {current}")]
    InvalidState {
        operation: &'static str,
        /// Display form of the notification or schedule status the operation
        /// found.
        current: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Unresolved template variables: {0}")]
    UnresolvedVariable(String),
}

impl EngineError {
    /// True when the error represents a failed delivery attempt that the
    /// scheduler's retry policy may recover.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Provider(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_errors_are_retryable() {
        let provider = EngineError::Provider(ProviderError::Rejected {
            provider: "smtp",
            message: "mailbox unavailable".to_string(),
        });
        assert!(provider.is_retryable());

        assert!(!EngineError::Validation("bad".into()).is_retryable());
        assert!(!EngineError::NotFound("x".into()).is_retryable());
    }
}
