//! Auth Error Types
//!
//! One taxonomy for every failure the orchestration layer can surface.
//! User-facing variants carry messages suitable for direct display;
//! recoverable variants are handled inside the state machine and never
//! escalate to a terminal error state.

use platform::password::PasswordPolicyError;
use platform::storage::StorageError;
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong email/password combination (or malformed identifier)
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Registration against an email that already has an account
    #[error("An account with this email already exists")]
    EmailAlreadyUsed,

    /// Password rejected by the strength policy or the backend
    #[error("Password rejected: {0}")]
    WeakPassword(String),

    /// Third-party provider declined the redirect flow
    #[error("Identity provider denied the request: {0}")]
    ProviderDenied(String),

    /// No authentication data present (startup check, replayed callback)
    #[error("No authentication session found")]
    NoSessionFound,

    /// Identity exists but no application profile record does
    #[error("User profile not found")]
    ProfileNotFound,

    /// Transport failure or timeout talking to the identity backend
    #[error("Network error: {0}")]
    Network(String),

    /// Missing or invalid client configuration (fatal, startup only)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bug or unexpected backend behavior
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether the message should be shown to the user verbatim
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::EmailAlreadyUsed
                | AuthError::WeakPassword(_)
                | AuthError::ProviderDenied(_)
                | AuthError::Network(_)
        )
    }

    /// Whether the state machine recovers locally instead of entering
    /// the terminal error state
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AuthError::ProfileNotFound | AuthError::NoSessionFound)
    }

    /// Log the error with the appropriate level
    pub(crate) fn log(&self) {
        match self {
            AuthError::Config(msg) => {
                tracing::error!(message = %msg, "Fatal auth configuration error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::Network(msg) => {
                tracing::warn!(message = %msg, "Identity backend unreachable");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::ProviderDenied(reason) => {
                tracing::warn!(reason = %reason, "Provider denied redirect flow");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl From<PasswordPolicyError> for AuthError {
    fn from(err: PasswordPolicyError) -> Self {
        AuthError::WeakPassword(err.to_string())
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Network("request timed out".to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(AuthError::InvalidCredentials.is_user_facing());
        assert!(AuthError::EmailAlreadyUsed.is_user_facing());
        assert!(AuthError::Network("down".to_string()).is_user_facing());
        assert!(!AuthError::ProfileNotFound.is_user_facing());
        assert!(!AuthError::Internal("bug".to_string()).is_user_facing());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(AuthError::ProfileNotFound.is_recoverable());
        assert!(AuthError::NoSessionFound.is_recoverable());
        assert!(!AuthError::InvalidCredentials.is_recoverable());
        assert!(!AuthError::Config("missing key".to_string()).is_recoverable());
    }

    #[test]
    fn test_policy_error_becomes_weak_password() {
        let err = platform::password::RawPassword::new("short".to_string()).unwrap_err();
        assert!(matches!(AuthError::from(err), AuthError::WeakPassword(_)));
    }
}
