//! Auth State Machine
//!
//! The orchestrator: consumes gateway results and caller actions, drives
//! state transitions, invokes the profile loader, and owns the authoritative
//! current state. All session mutation happens here, one transition at a
//! time, so concurrent flows can never interleave writes.
//!
//! Overlap policy: a later accepted attempt supersedes an earlier one. Every
//! accepted attempt takes a monotonically increasing token and a completion
//! commits only while its token is still current, so a slow stale network
//! call can never clobber a newer session.

use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use url::Url;

use crate::application::config::OrchestratorConfig;
use crate::application::events::{AuthEvent, AuthEvents, EventBroadcaster};
use crate::application::profile_loader::ProfileLoader;
use crate::application::session_store::SessionStore;
use crate::domain::entity::identity::Identity;
use crate::domain::entity::profile::{ProfileChanges, default_username};
use crate::domain::entity::session::Session;
use crate::domain::gateway::{
    IdentityGateway, ProfileStore, RedirectRequest, RegistrationClaims, SnapshotStore,
};
use crate::domain::value_object::{email::Email, provider::Provider};
use crate::error::{AuthError, AuthResult};
use platform::password::RawPassword;

/// Delay before the single backend sign-out retry
const SIGN_OUT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Authentication lifecycle state
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    /// No session; the initial and safe-retriable state
    SignedOut,
    /// A sign-in, sign-up, or callback attempt is in flight
    Authenticating,
    /// A verified session is loaded
    SignedIn(Arc<Session>),
    /// An attempt failed; stable until the next explicit action
    Failed(String),
}

impl AuthState {
    pub const fn name(&self) -> &'static str {
        match self {
            AuthState::SignedOut => "signed_out",
            AuthState::Authenticating => "authenticating",
            AuthState::SignedIn(_) => "signed_in",
            AuthState::Failed(_) => "failed",
        }
    }

    pub const fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn(_))
    }
}

/// Registration form input
#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
}

/// The auth orchestrator
pub struct AuthOrchestrator<G, P, S> {
    gateway: Arc<G>,
    loader: ProfileLoader<P>,
    store: SessionStore<S>,
    state: RwLock<AuthState>,
    /// Token of the most recently accepted attempt
    attempt: AtomicU64,
    /// Serializes transition commits, including snapshot I/O
    transitions: Mutex<()>,
    events: EventBroadcaster,
}

impl<G, P, S> AuthOrchestrator<G, P, S>
where
    G: IdentityGateway + Send + Sync + 'static,
    P: ProfileStore + Send + Sync + 'static,
    S: SnapshotStore + Send + Sync + 'static,
{
    pub fn new(
        gateway: Arc<G>,
        profiles: Arc<P>,
        snapshots: Arc<S>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gateway,
            loader: ProfileLoader::new(profiles, &config),
            store: SessionStore::new(snapshots),
            state: RwLock::new(AuthState::SignedOut),
            attempt: AtomicU64::new(0),
            transitions: Mutex::new(()),
            events: EventBroadcaster::new(),
        }
    }

    // ========================================================================
    // Reads (free for any component, any frequency)
    // ========================================================================

    /// Current lifecycle state
    pub fn state(&self) -> AuthState {
        self.state.read().expect("state lock poisoned").clone()
    }

    /// Current session, if signed in
    pub fn current_session(&self) -> Option<Arc<Session>> {
        self.store.current()
    }

    /// Advisory pre-render hint; never proof of authentication
    pub async fn cached_hint(&self) -> Option<Session> {
        self.store.cached_hint().await
    }

    /// Subscribe to completed transitions; drop the handle to unsubscribe
    pub fn subscribe(&self) -> AuthEvents {
        self.events.subscribe()
    }

    /// Pure capability check against the current session
    pub fn has_permission(&self, permission: &str) -> bool {
        self.store
            .current()
            .is_some_and(|s| s.has_permission(permission))
    }

    /// Pure admin check against the current session
    pub fn is_admin(&self) -> bool {
        self.store.current().is_some_and(|s| s.is_admin())
    }

    // ========================================================================
    // Actions
    // ========================================================================

    /// Re-establish state at application startup: verify any persisted
    /// backend session and load its profile. Returns the resulting state.
    pub async fn bootstrap(&self) -> AuthResult<AuthState> {
        let token = self.begin_attempt();

        match self.gateway.current_identity().await {
            Ok(Some(identity)) => {
                tracing::info!(user_id = %identity.user_id, "Persisted session found, verifying");
                self.enter_authenticating(token).await;
                match self.finish_login(token, identity).await {
                    Ok(_) => {}
                    Err(err) if err.is_recoverable() => {
                        tracing::info!(error = %err, "Startup session not usable, staying signed out");
                    }
                    // finish_login already moved the machine to Failed
                    // and logged the cause
                    Err(_) => {}
                }
                Ok(self.state())
            }
            Ok(None) => {
                tracing::debug!("No persisted session at startup");
                Ok(self.state())
            }
            Err(err) => {
                err.log();
                Err(err)
            }
        }
    }

    /// Password sign-in
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Arc<Session>> {
        // A credential that cannot pass validation cannot be valid. The
        // rejection takes the same terminal path as a backend rejection, so
        // callers observe one behavior for all invalid credentials.
        let (email, password) = match (Email::new(email), RawPassword::new(password.to_owned())) {
            (Ok(email), Ok(password)) => (email, password),
            _ => {
                let token = self.begin_attempt();
                return Err(self.fail_attempt(token, AuthError::InvalidCredentials).await);
            }
        };

        let token = self.begin_attempt();
        self.enter_authenticating(token).await;

        match self.gateway.sign_in_with_password(&email, &password).await {
            Ok(identity) => {
                tracing::info!(
                    user_id = %identity.user_id,
                    provider = %identity.provider,
                    "Identity authenticated"
                );
                self.spawn_record_login(identity.user_id.clone());
                self.finish_login(token, identity).await
            }
            Err(err) => Err(self.fail_attempt(token, err).await),
        }
    }

    /// Create a new account. Registration does not establish a session;
    /// the caller signs in explicitly afterwards (email verification is
    /// informational and does not gate that sign-in).
    pub async fn register(&self, input: RegisterInput) -> AuthResult<()> {
        let email = Email::new(&input.email).map_err(|_| AuthError::InvalidCredentials)?;
        // Policy violations surface as WeakPassword before any attempt starts
        let password = RawPassword::new(input.password)?;

        let claims = RegistrationClaims {
            username: Some(
                input
                    .username
                    .unwrap_or_else(|| default_username(&email)),
            ),
            first_name: input.first_name,
            last_name: input.last_name,
            company: input.company,
            job_title: input.job_title,
            department: input.department,
            phone: input.phone,
            country: input.country,
        };

        let token = self.begin_attempt();
        self.enter_authenticating(token).await;

        match self
            .gateway
            .sign_up_with_password(&email, &password, &claims)
            .await
        {
            Ok(identity) => {
                tracing::info!(user_id = %identity.user_id, email = %email, "User registered");
                self.commit_signed_out(token).await;
                Ok(())
            }
            Err(err) => Err(self.fail_attempt(token, err).await),
        }
    }

    /// Prepare a third-party sign-in. Returns the consent-screen URL for
    /// the host UI to navigate to; this is the last cancellation point of
    /// the flow, so no state changes yet.
    pub async fn begin_provider_redirect(
        &self,
        provider: Provider,
        return_path: &str,
    ) -> AuthResult<RedirectRequest> {
        let request = self.gateway.begin_redirect(provider, return_path).await?;
        tracing::info!(provider = %provider, return_path, "Redirecting to provider consent screen");
        Ok(request)
    }

    /// Finish a third-party sign-in from the inbound callback URL.
    /// A replayed callback resolves to `NoSessionFound` and a safe
    /// signed-out state; a provider error becomes the terminal error state.
    pub async fn handle_redirect_callback(&self, callback_url: &Url) -> AuthResult<Arc<Session>> {
        let token = self.begin_attempt();
        self.enter_authenticating(token).await;

        match self.gateway.complete_redirect_callback(callback_url).await {
            Ok(identity) => {
                tracing::info!(
                    user_id = %identity.user_id,
                    provider = %identity.provider,
                    "Redirect callback completed"
                );
                self.spawn_record_login(identity.user_id.clone());
                self.finish_login(token, identity).await
            }
            Err(AuthError::NoSessionFound) => {
                tracing::debug!("Callback carried no redirect data, returning to signed out");
                self.commit_signed_out(token).await;
                Err(AuthError::NoSessionFound)
            }
            Err(err) => Err(self.fail_attempt(token, err).await),
        }
    }

    /// Sign out. Local clearing is unconditional and idempotent; backend
    /// invalidation is best-effort with one logged retry.
    pub async fn sign_out(&self) -> AuthResult<()> {
        // Supersede any in-flight attempt so it cannot commit afterwards
        let token = self.begin_attempt();

        {
            let _guard = self.transitions.lock().await;
            if matches!(self.state(), AuthState::SignedOut) {
                tracing::debug!("Sign-out requested while already signed out");
                return Ok(());
            }

            let prev = self.state();
            let had_session = self.store.current().is_some();
            self.store.clear().await;
            self.set_state(AuthState::SignedOut);

            // No broadcast for a cancelled in-flight attempt that never
            // held a session
            if had_session || matches!(prev, AuthState::SignedIn(_) | AuthState::Failed(_)) {
                self.events.emit(AuthEvent::SignedOut);
            }
            tracing::info!(token, "Signed out locally");
        }

        if let Err(err) = self.gateway.sign_out().await {
            tracing::warn!(error = %err, "Backend sign-out failed, scheduling retry");
            self.spawn_sign_out_retry();
        }
        Ok(())
    }

    /// Reload profile and permissions for the current identity and replace
    /// the session wholesale. A transport failure keeps the existing
    /// session; a missing profile signs out.
    pub async fn refresh(&self) -> AuthResult<Arc<Session>> {
        let current = self.store.current().ok_or(AuthError::NoSessionFound)?;
        let token = self.begin_attempt();

        match self.loader.load(&current.identity).await {
            Ok(session) => self.commit_signed_in(token, session).await,
            Err(AuthError::ProfileNotFound) => {
                tracing::info!(
                    user_id = %current.identity.user_id,
                    "Profile gone on refresh, signing out"
                );
                self.commit_signed_out(token).await;
                Err(AuthError::ProfileNotFound)
            }
            Err(err) => {
                err.log();
                Err(err)
            }
        }
    }

    /// Apply a profile update, then refresh the session
    pub async fn update_profile(&self, changes: &ProfileChanges) -> AuthResult<Arc<Session>> {
        let current = self.store.current().ok_or(AuthError::NoSessionFound)?;
        if changes.is_empty() {
            return Ok(current);
        }

        self.loader
            .store()
            .update_profile(&current.identity.user_id, changes)
            .await?;
        self.refresh().await
    }

    // ========================================================================
    // Transition plumbing
    // ========================================================================

    fn begin_attempt(&self) -> u64 {
        self.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, token: u64) -> bool {
        self.attempt.load(Ordering::SeqCst) == token
    }

    fn set_state(&self, next: AuthState) {
        let mut state = self.state.write().expect("state lock poisoned");
        tracing::debug!(from = state.name(), to = next.name(), "Auth state transition");
        *state = next;
    }

    async fn enter_authenticating(&self, token: u64) {
        let _guard = self.transitions.lock().await;
        if self.is_current(token) {
            self.set_state(AuthState::Authenticating);
        }
    }

    /// Load the profile for a verified identity and commit the session
    async fn finish_login(&self, token: u64, identity: Identity) -> AuthResult<Arc<Session>> {
        match self.loader.load(&identity).await {
            Ok(session) => self.commit_signed_in(token, session).await,
            Err(AuthError::ProfileNotFound) => {
                // Recognized identity without an application profile: a
                // recoverable condition, not a hard failure
                tracing::info!(
                    user_id = %identity.user_id,
                    "No application profile for identity, returning to signed out"
                );
                self.commit_signed_out(token).await;
                Err(AuthError::ProfileNotFound)
            }
            Err(err) => Err(self.fail_attempt(token, err).await),
        }
    }

    async fn commit_signed_in(&self, token: u64, session: Session) -> AuthResult<Arc<Session>> {
        let _guard = self.transitions.lock().await;
        if !self.is_current(token) {
            tracing::debug!(token, "Discarding superseded sign-in result");
            return Err(AuthError::Internal(
                "sign-in attempt superseded by a newer attempt".to_string(),
            ));
        }

        let session = self.store.replace(session);
        self.set_state(AuthState::SignedIn(Arc::clone(&session)));
        self.events.emit(AuthEvent::SignedIn((*session).clone()));
        self.store.persist(&session).await;

        tracing::info!(
            user_id = %session.identity.user_id,
            username = %session.profile.username,
            permissions = session.permissions.len(),
            "Signed in"
        );
        Ok(session)
    }

    async fn commit_signed_out(&self, token: u64) {
        let _guard = self.transitions.lock().await;
        if !self.is_current(token) {
            tracing::debug!(token, "Discarding superseded sign-out transition");
            return;
        }

        let prev = self.state();
        let had_session = self.store.current().is_some();
        self.store.clear().await;
        self.set_state(AuthState::SignedOut);

        // Broadcast only when something observable was torn down; a failed
        // attempt that never held a session ends silently
        if had_session || matches!(prev, AuthState::SignedIn(_) | AuthState::Failed(_)) {
            self.events.emit(AuthEvent::SignedOut);
        }
    }

    async fn fail_attempt(&self, token: u64, err: AuthError) -> AuthError {
        err.log();

        let _guard = self.transitions.lock().await;
        if self.is_current(token) {
            // A failed attempt never leaves a session behind
            self.store.clear().await;
            self.set_state(AuthState::Failed(err.to_string()));
            self.events.emit(AuthEvent::AuthFailed(err.to_string()));
        } else {
            tracing::debug!(token, "Discarding superseded failure");
        }
        err
    }

    /// Stamp last-login in the background; never blocks or fails sign-in
    fn spawn_record_login(&self, user_id: String) {
        let profiles = Arc::clone(self.loader.store());
        tokio::spawn(async move {
            if let Err(err) = profiles.record_login(&user_id).await {
                tracing::warn!(user_id, error = %err, "Failed to record last login");
            }
        });
    }

    fn spawn_sign_out_retry(&self) {
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            tokio::time::sleep(SIGN_OUT_RETRY_DELAY).await;
            match gateway.sign_out().await {
                Ok(()) => tracing::info!("Backend sign-out succeeded on retry"),
                Err(err) => tracing::warn!(
                    error = %err,
                    "Backend sign-out retry failed; session will expire server-side"
                ),
            }
        });
    }
}
