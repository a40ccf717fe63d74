//! HTTP Identity Gateway
//!
//! REST client for the hosted identity backend. Authentication endpoints
//! live under `auth/v1/`; every request carries the public API key, and
//! session-bound requests add the bearer access token.
//!
//! The redirect flow uses PKCE (S256): `begin_redirect` persists the
//! verifier and state nonce to durable storage, the host navigates away,
//! and `complete_redirect_callback` consumes them exactly once in a later
//! process.

use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::application::config::GatewayConfig;
use crate::domain::entity::identity::Identity;
use crate::domain::gateway::{IdentityGateway, RedirectRequest, RegistrationClaims};
use crate::domain::value_object::{email::Email, provider::Provider};
use crate::error::{AuthError, AuthResult};
use platform::password::RawPassword;
use platform::pkce::{generate_pkce, state_nonce};
use platform::storage::JsonStore;

/// Storage key for the persisted token pair
const KEY_TOKENS: &str = "tokens";
/// Storage key for the pending redirect, consumed exactly once
const KEY_PENDING_REDIRECT: &str = "pending-redirect";

/// Per-request transport timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP-backed identity gateway
pub struct HttpIdentityGateway {
    http: reqwest::Client,
    config: GatewayConfig,
    storage: JsonStore,
    /// In-memory copy of the persisted token pair
    tokens: RwLock<Option<StoredTokens>>,
}

impl HttpIdentityGateway {
    pub fn new(config: GatewayConfig, storage: JsonStore) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {e}")))?;

        // A corrupt token record means signing in again, not failing startup
        let tokens = match storage.load::<StoredTokens>(KEY_TOKENS) {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::warn!(error = %err, "Discarding unreadable token record");
                let _ = storage.delete(KEY_TOKENS);
                None
            }
        };

        Ok(Self {
            http,
            config,
            storage,
            tokens: RwLock::new(tokens),
        })
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| AuthError::Internal(format!("Invalid endpoint {path}: {e}")))
    }

    /// Bearer token for session-bound requests, shared with the profile
    /// store client
    pub(crate) fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .expect("token lock poisoned")
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    fn remember_tokens(&self, tokens: StoredTokens) {
        if let Err(err) = self.storage.save(KEY_TOKENS, &tokens) {
            tracing::warn!(error = %err, "Failed to persist tokens; session will not survive restart");
        }
        *self.tokens.write().expect("token lock poisoned") = Some(tokens);
    }

    fn forget_tokens(&self) {
        *self.tokens.write().expect("token lock poisoned") = None;
        if let Err(err) = self.storage.delete(KEY_TOKENS) {
            tracing::warn!(error = %err, "Failed to delete persisted tokens");
        }
    }

    /// Exchange the callback authorization code for a token pair
    async fn exchange_code(&self, code: &str, verifier: &str) -> AuthResult<TokenResponse> {
        let url = self.endpoint("auth/v1/token")?;
        let response = self
            .http
            .post(url)
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "auth_code": code,
                "code_verifier": verifier,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(redirect_error(response).await);
        }
        Ok(response.json::<TokenResponse>().await?)
    }
}

impl IdentityGateway for HttpIdentityGateway {
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &RawPassword,
    ) -> AuthResult<Identity> {
        let url = self.endpoint("auth/v1/token")?;
        let response = self
            .http
            .post(url)
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "email": email.as_str(),
                "password": password.expose(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            // Any credential rejection reads the same to the caller
            let status = response.status();
            if status.as_u16() == 400 || status.as_u16() == 401 {
                return Err(AuthError::InvalidCredentials);
            }
            return Err(backend_error(response).await);
        }

        let granted = response.json::<TokenResponse>().await?;
        let identity = granted.user.clone().into_identity()?;
        self.remember_tokens(granted.into_tokens());
        Ok(identity)
    }

    async fn sign_up_with_password(
        &self,
        email: &Email,
        password: &RawPassword,
        claims: &RegistrationClaims,
    ) -> AuthResult<Identity> {
        let url = self.endpoint("auth/v1/signup")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.api_key)
            .json(&serde_json::json!({
                "email": email.as_str(),
                "password": password.expose(),
                "data": SignupMetadata::from_claims(claims),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(signup_error(response).await);
        }

        // With email confirmation enabled the backend returns the bare user;
        // otherwise it returns a full token grant
        let body = response.json::<serde_json::Value>().await?;
        if body.get("access_token").is_some() {
            let granted: TokenResponse = serde_json::from_value(body)
                .map_err(|e| AuthError::Internal(format!("Malformed signup grant: {e}")))?;
            let identity = granted.user.clone().into_identity()?;
            self.remember_tokens(granted.into_tokens());
            Ok(identity)
        } else {
            let user: WireUser = serde_json::from_value(body)
                .map_err(|e| AuthError::Internal(format!("Malformed signup response: {e}")))?;
            user.into_identity()
        }
    }

    async fn begin_redirect(
        &self,
        provider: Provider,
        return_path: &str,
    ) -> AuthResult<RedirectRequest> {
        let code = provider.redirect_code().ok_or_else(|| {
            AuthError::Internal(format!("Provider {provider} has no redirect flow"))
        })?;

        let pkce = generate_pkce();
        let state = state_nonce();

        let mut url = self.endpoint("auth/v1/authorize")?;
        url.query_pairs_mut()
            .append_pair("provider", code)
            .append_pair("redirect_to", self.config.redirect_url.as_str())
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "s256")
            .append_pair("state", &state);

        let pending = PendingRedirect {
            verifier: pkce.verifier,
            state,
            provider,
            return_path: return_path.to_string(),
        };
        // Must be durable before navigation: the callback runs in a fresh
        // process with no memory of this one
        self.storage.save(KEY_PENDING_REDIRECT, &pending)?;

        Ok(RedirectRequest {
            url,
            provider,
            return_path: pending.return_path,
        })
    }

    async fn complete_redirect_callback(&self, callback_url: &Url) -> AuthResult<Identity> {
        let params = CallbackParams::parse(callback_url);

        // Exactly-once: a replayed callback finds nothing pending
        let pending = self
            .storage
            .take::<PendingRedirect>(KEY_PENDING_REDIRECT)?
            .ok_or(AuthError::NoSessionFound)?;

        if let Some(reason) = params.error {
            return Err(AuthError::ProviderDenied(
                params.error_description.unwrap_or(reason),
            ));
        }

        match params.state {
            Some(state) if state == pending.state => {}
            _ => {
                tracing::warn!(provider = %pending.provider, "Redirect state mismatch");
                return Err(AuthError::ProviderDenied(
                    "redirect state mismatch".to_string(),
                ));
            }
        }

        let granted = match (params.code, params.fragment_tokens) {
            (Some(code), _) => self.exchange_code(&code, &pending.verifier).await?,
            // Implicit-flow fallback: tokens arrive in the URL fragment
            (None, Some(tokens)) => {
                self.remember_tokens(tokens);
                let identity = self.current_identity().await?;
                return identity.ok_or(AuthError::NoSessionFound);
            }
            (None, None) => return Err(AuthError::NoSessionFound),
        };

        let identity = granted.user.clone().into_identity()?;
        self.remember_tokens(granted.into_tokens());
        Ok(identity)
    }

    async fn current_identity(&self) -> AuthResult<Option<Identity>> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };

        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .http
            .get(url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&token)
            .send()
            .await?;

        if response.status().as_u16() == 401 {
            tracing::info!("Persisted session expired");
            self.forget_tokens();
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(backend_error(response).await);
        }

        let user = response.json::<WireUser>().await?;
        Ok(Some(user.into_identity()?))
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let token = self.access_token();
        // Transport state goes first; a dangling backend session only means
        // the token expires on its own
        self.forget_tokens();
        let _ = self.storage.delete(KEY_PENDING_REDIRECT);

        let Some(token) = token else {
            return Ok(());
        };

        let url = self.endpoint("auth/v1/logout")?;
        let response = self
            .http
            .post(url)
            .header("apikey", &self.config.api_key)
            .bearer_auth(&token)
            .send()
            .await?;

        // An already-dead token is a successful sign-out
        if response.status().is_success() || response.status().as_u16() == 401 {
            Ok(())
        } else {
            Err(backend_error(response).await)
        }
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// Persisted token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    refresh_token: Option<String>,
}

/// Pending redirect record, persisted across the consent navigation
#[derive(Debug, Serialize, Deserialize)]
struct PendingRedirect {
    verifier: String,
    state: String,
    provider: Provider,
    return_path: String,
}

/// Token grant response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: WireUser,
}

impl TokenResponse {
    fn into_tokens(self) -> StoredTokens {
        StoredTokens {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

/// Identity record as the backend serves it
#[derive(Debug, Clone, Deserialize)]
struct WireUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    #[serde(default)]
    app_metadata: WireAppMetadata,
    #[serde(default)]
    user_metadata: WireUserMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WireAppMetadata {
    #[serde(default)]
    provider: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WireUserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl WireUser {
    fn into_identity(self) -> AuthResult<Identity> {
        let raw_email = self
            .email
            .ok_or_else(|| AuthError::Internal("Identity record without email".to_string()))?;
        let email = Email::new(&raw_email)
            .map_err(|e| AuthError::Internal(format!("Backend served invalid email: {e}")))?;

        let provider = self
            .app_metadata
            .provider
            .as_deref()
            .map(Provider::from_code)
            .unwrap_or_default();

        Ok(Identity {
            user_id: self.id,
            email,
            email_verified: self.email_confirmed_at.is_some(),
            provider,
            display_name: self.user_metadata.full_name.or(self.user_metadata.name),
            avatar_url: self.user_metadata.avatar_url,
        })
    }
}

/// Registration claims as signup metadata
#[derive(Debug, Serialize)]
struct SignupMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<&'a str>,
}

impl<'a> SignupMetadata<'a> {
    fn from_claims(claims: &'a RegistrationClaims) -> Self {
        Self {
            username: claims.username.as_deref(),
            first_name: claims.first_name.as_deref(),
            last_name: claims.last_name.as_deref(),
            company: claims.company.as_deref(),
            job_title: claims.job_title.as_deref(),
            department: claims.department.as_deref(),
            phone: claims.phone.as_deref(),
            country: claims.country.as_deref(),
        }
    }
}

/// Everything a provider callback URL can carry, in query or fragment
#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    fragment_tokens: Option<StoredTokens>,
}

impl CallbackParams {
    fn parse(url: &Url) -> Self {
        let mut params = Self::default();
        let mut fragment_access = None;
        let mut fragment_refresh = None;

        let fragment_pairs = url
            .fragment()
            .map(|f| url::form_urlencoded::parse(f.as_bytes()))
            .into_iter()
            .flatten();

        for (key, value) in url.query_pairs().chain(fragment_pairs) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                "access_token" => fragment_access = Some(value.into_owned()),
                "refresh_token" => fragment_refresh = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(access_token) = fragment_access {
            params.fragment_tokens = Some(StoredTokens {
                access_token,
                refresh_token: fragment_refresh,
            });
        }
        params
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct WireError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl WireError {
    fn message(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.error)
    }
}

async fn read_error(response: reqwest::Response) -> (u16, Option<String>) {
    let status = response.status().as_u16();
    let message = match response.text().await {
        Ok(body) => serde_json::from_str::<WireError>(&body)
            .ok()
            .and_then(WireError::message),
        Err(_) => None,
    };
    (status, message)
}

/// Generic backend failure
async fn backend_error(response: reqwest::Response) -> AuthError {
    let (status, message) = read_error(response).await;
    if status >= 500 {
        AuthError::Network(format!("Identity backend returned {status}"))
    } else {
        AuthError::Internal(
            message.unwrap_or_else(|| format!("Identity backend returned {status}")),
        )
    }
}

/// Signup failure: distinguish the duplicate-email and weak-password cases
async fn signup_error(response: reqwest::Response) -> AuthError {
    let (status, message) = read_error(response).await;
    let message = message.unwrap_or_else(|| format!("Signup rejected with status {status}"));
    let lowered = message.to_lowercase();

    if lowered.contains("already registered") || lowered.contains("already exists") {
        AuthError::EmailAlreadyUsed
    } else if lowered.contains("password") {
        AuthError::WeakPassword(message)
    } else if status >= 500 {
        AuthError::Network(format!("Identity backend returned {status}"))
    } else {
        AuthError::Internal(message)
    }
}

/// Token-exchange failure during the redirect flow
async fn redirect_error(response: reqwest::Response) -> AuthError {
    let (status, message) = read_error(response).await;
    if status >= 500 {
        AuthError::Network(format!("Identity backend returned {status}"))
    } else {
        AuthError::ProviderDenied(
            message.unwrap_or_else(|| format!("Code exchange rejected with status {status}")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_params_from_query() {
        let url = Url::parse("http://localhost:3000/auth/callback?code=abc&state=xyz").unwrap();
        let params = CallbackParams::parse(&url);

        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert!(params.error.is_none());
        assert!(params.fragment_tokens.is_none());
    }

    #[test]
    fn test_callback_params_from_fragment() {
        let url = Url::parse(
            "http://localhost:3000/auth/callback#access_token=tok&refresh_token=ref&state=xyz",
        )
        .unwrap();
        let params = CallbackParams::parse(&url);

        let tokens = params.fragment_tokens.unwrap();
        assert_eq!(tokens.access_token, "tok");
        assert_eq!(tokens.refresh_token.as_deref(), Some("ref"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_callback_params_error() {
        let url = Url::parse(
            "http://localhost:3000/auth/callback?error=access_denied&error_description=User+said+no",
        )
        .unwrap();
        let params = CallbackParams::parse(&url);

        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User said no"));
    }

    #[test]
    fn test_wire_user_mapping() {
        let user: WireUser = serde_json::from_value(serde_json::json!({
            "id": "user-1",
            "email": "Ada@Example.com",
            "email_confirmed_at": "2026-01-01T00:00:00Z",
            "app_metadata": {"provider": "google"},
            "user_metadata": {"full_name": "Ada Lovelace", "avatar_url": "https://a/b.png"}
        }))
        .unwrap();

        let identity = user.into_identity().unwrap();
        assert_eq!(identity.user_id, "user-1");
        assert_eq!(identity.email.as_str(), "ada@example.com");
        assert!(identity.email_verified);
        assert_eq!(identity.provider, Provider::Google);
        assert_eq!(identity.display_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn test_wire_user_defaults() {
        let user: WireUser = serde_json::from_value(serde_json::json!({
            "id": "user-2",
            "email": "b@example.com"
        }))
        .unwrap();

        let identity = user.into_identity().unwrap();
        assert!(!identity.email_verified);
        assert_eq!(identity.provider, Provider::Password);
        assert!(identity.display_name.is_none());
    }
}
