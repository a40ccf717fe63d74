//! Gateway Traits
//!
//! Interfaces to the external collaborators: the identity backend, the
//! profile store, and durable client storage. Implementations live in the
//! infrastructure layer; tests substitute fakes through the same traits.

use url::Url;

use crate::domain::entity::identity::Identity;
use crate::domain::entity::profile::{Profile, ProfileChanges};
use crate::domain::entity::session::CachedSnapshot;
use crate::domain::value_object::{email::Email, provider::Provider};
use crate::error::AuthResult;
use platform::password::RawPassword;

/// Registration form fields beyond the credentials.
/// Sent to the backend as signup metadata; the profile store materializes
/// them into the stored Profile record.
#[derive(Debug, Clone, Default)]
pub struct RegistrationClaims {
    /// Defaults to the email local part when `None`
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
}

/// Outcome of `begin_redirect`: the composed consent-screen URL.
///
/// The host UI performs the actual navigation; once it does, this execution
/// context is gone, so this is the last cancellation point of the flow.
#[derive(Debug, Clone)]
pub struct RedirectRequest {
    pub url: Url,
    pub provider: Provider,
    /// Application path to resume at after the callback completes
    pub return_path: String,
}

/// Identity backend gateway
#[trait_variant::make(IdentityGateway: Send)]
pub trait LocalIdentityGateway {
    /// Authenticate with email and password
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &RawPassword,
    ) -> AuthResult<Identity>;

    /// Create a new account with email, password and registration claims
    async fn sign_up_with_password(
        &self,
        email: &Email,
        password: &RawPassword,
        claims: &RegistrationClaims,
    ) -> AuthResult<Identity>;

    /// Prepare the third-party consent redirect. Persists the PKCE state
    /// that `complete_redirect_callback` will consume.
    async fn begin_redirect(
        &self,
        provider: Provider,
        return_path: &str,
    ) -> AuthResult<RedirectRequest>;

    /// Finish a redirect flow from the inbound callback URL.
    /// Consumes the pending redirect state exactly once: a replayed
    /// callback resolves to `NoSessionFound`.
    async fn complete_redirect_callback(&self, callback_url: &Url) -> AuthResult<Identity>;

    /// Identity for the persisted backend session, if one is still valid
    async fn current_identity(&self) -> AuthResult<Option<Identity>>;

    /// Invalidate the backend session and clear persisted transport state
    async fn sign_out(&self) -> AuthResult<()>;
}

/// Application profile store
#[trait_variant::make(ProfileStore: Send)]
pub trait LocalProfileStore {
    /// Fetch the profile for an identity; `None` when the record does not
    /// exist (yet)
    async fn fetch_profile(&self, user_id: &str) -> AuthResult<Option<Profile>>;

    /// Fetch the capability strings for an identity
    async fn fetch_permissions(&self, user_id: &str) -> AuthResult<Vec<String>>;

    /// Apply a partial profile update and return the stored record
    async fn update_profile(&self, user_id: &str, changes: &ProfileChanges)
    -> AuthResult<Profile>;

    /// Stamp the last-login timestamp (best-effort, caller logs failures)
    async fn record_login(&self, user_id: &str) -> AuthResult<()>;
}

/// Durable snapshot storage
#[trait_variant::make(SnapshotStore: Send)]
pub trait LocalSnapshotStore {
    async fn load(&self) -> AuthResult<Option<CachedSnapshot>>;

    async fn store(&self, snapshot: &CachedSnapshot) -> AuthResult<()>;

    async fn clear(&self) -> AuthResult<()>;
}
