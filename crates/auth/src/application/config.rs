//! Application Configuration
//!
//! Identity backend connection settings and orchestrator tuning.
//! Missing backend settings are a fatal error detected at startup,
//! never at first use.

use std::time::Duration;

use url::Url;

use crate::error::{AuthError, AuthResult};
use platform::retry::RetryPolicy;

/// Environment variable holding the identity backend base URL
pub const ENV_IDENTITY_URL: &str = "IDENTITY_URL";
/// Environment variable holding the public API key
pub const ENV_IDENTITY_ANON_KEY: &str = "IDENTITY_ANON_KEY";
/// Environment variable holding the OAuth callback URL of this application
pub const ENV_IDENTITY_REDIRECT_URL: &str = "IDENTITY_REDIRECT_URL";

/// Default callback route during local development
const DEFAULT_REDIRECT_URL: &str = "http://localhost:3000/auth/callback";

/// Identity backend connection configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the identity backend
    pub base_url: Url,
    /// Public (anonymous) API key, sent on every request
    pub api_key: String,
    /// Callback URL the provider redirects back to
    pub redirect_url: Url,
}

impl GatewayConfig {
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        redirect_url: impl AsRef<str>,
    ) -> AuthResult<Self> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| AuthError::Config(format!("Invalid identity backend URL: {e}")))?;
        let redirect_url = Url::parse(redirect_url.as_ref())
            .map_err(|e| AuthError::Config(format!("Invalid redirect URL: {e}")))?;

        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AuthError::Config("Identity API key is empty".to_string()));
        }

        Ok(Self {
            base_url,
            api_key,
            redirect_url,
        })
    }

    /// Read the configuration from the environment.
    ///
    /// `IDENTITY_URL` and `IDENTITY_ANON_KEY` are required;
    /// `IDENTITY_REDIRECT_URL` defaults to the local development callback.
    pub fn from_env() -> AuthResult<Self> {
        let base_url = require_env(ENV_IDENTITY_URL)?;
        let api_key = require_env(ENV_IDENTITY_ANON_KEY)?;
        let redirect_url = std::env::var(ENV_IDENTITY_REDIRECT_URL)
            .unwrap_or_else(|_| DEFAULT_REDIRECT_URL.to_string());

        Self::new(base_url, api_key, redirect_url)
    }
}

fn require_env(name: &str) -> AuthResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AuthError::Config(format!(
            "{name} must be set in the environment"
        ))),
    }
}

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bound on each profile/permission fetch; a timeout surfaces as a
    /// network error
    pub profile_timeout: Duration,
    /// Retry policy for the profile-provisioning race after sign-up
    pub profile_retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            profile_timeout: Duration::from_secs(10),
            profile_retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Fast-failing config for tests: one attempt, tiny delays
    pub fn impatient() -> Self {
        Self {
            profile_timeout: Duration::from_millis(200),
            profile_retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(5),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_bad_url() {
        let err = GatewayConfig::new("not a url", "key", DEFAULT_REDIRECT_URL).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn test_config_rejects_empty_key() {
        let err = GatewayConfig::new("https://id.example.com", "  ", DEFAULT_REDIRECT_URL)
            .unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn test_config_accepts_valid_settings() {
        let config =
            GatewayConfig::new("https://id.example.com", "anon-key", DEFAULT_REDIRECT_URL)
                .unwrap();
        assert_eq!(config.base_url.as_str(), "https://id.example.com/");
        assert_eq!(config.api_key, "anon-key");
    }
}
