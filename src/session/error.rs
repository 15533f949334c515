//! Session error types

use thiserror::Error;

use super::store::StoreError;

/// Errors raised while acquiring, storing or refreshing credentials
#[derive(Error, Debug)]
pub enum SessionError {
    /// The identity provider rejected the request
    #[error("Identity provider error {status}: {error}")]
    Provider {
        status: u16,
        error: String,
        description: Option<String>,
    },

    /// Network-level failure talking to a remote service
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A token response or stored value could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Refusing to persist an empty access token
    #[error("Access token is empty")]
    EmptyToken,

    #[error("No refresh token available")]
    NoRefreshToken,

    /// The backend auth endpoint answered with a failure
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Short human-readable reason, preferring the provider's description
    pub fn detail(&self) -> String {
        match self {
            SessionError::Provider {
                error, description, ..
            } => description.clone().unwrap_or_else(|| error.clone()),
            other => other.to_string(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::Provider {
            status: 400,
            error: "invalid_grant".to_string(),
            description: Some("Code not valid".to_string()),
        };
        assert_eq!(err.to_string(), "Identity provider error 400: invalid_grant");
        assert_eq!(err.detail(), "Code not valid");

        assert_eq!(
            SessionError::NoRefreshToken.to_string(),
            "No refresh token available"
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let err: SessionError = StoreError::Lock("poisoned".into()).into();
        assert!(matches!(err, SessionError::Store(_)));
    }
}
