use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing or malformed client settings; fixable by the user.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authorization was cancelled by the user")]
    AuthorizationCancelled,

    #[error("Token exchange failed with status {status_code}: {body}")]
    TokenExchange { status_code: u16, body: String },

    #[error("Token refresh failed: {reason}")]
    TokenRefresh {
        status_code: Option<u16>,
        reason: String,
    },

    #[error("Authorization state mismatch")]
    StateMismatch,

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("Authorization prompt unavailable: {0}")]
    PromptUnavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// Whether retrying the same operation may succeed without user changes.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::AuthorizationCancelled
                | AuthError::OperationTimeout { .. }
                | AuthError::Network(_)
                | AuthError::StateMismatch
                | AuthError::TokenRefresh { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
