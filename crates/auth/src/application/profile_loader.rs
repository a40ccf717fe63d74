//! Profile Loader
//!
//! Turns a bare Identity into an authorized application Session: fetches
//! the stored profile (with bounded retries while provisioning catches up),
//! fetches permissions independently, and merges in the identity claims.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::application::config::OrchestratorConfig;
use crate::domain::entity::{identity::Identity, profile::Profile, session::Session};
use crate::domain::gateway::ProfileStore;
use crate::domain::permission::PermissionSet;
use crate::error::{AuthError, AuthResult};
use platform::retry::RetryPolicy;

/// Profile loading service
#[derive(Debug)]
pub struct ProfileLoader<P> {
    store: Arc<P>,
    retry: RetryPolicy,
    fetch_timeout: Duration,
}

impl<P> ProfileLoader<P>
where
    P: ProfileStore + Sync,
{
    pub fn new(store: Arc<P>, config: &OrchestratorConfig) -> Self {
        Self {
            store,
            retry: config.profile_retry.clone(),
            fetch_timeout: config.profile_timeout,
        }
    }

    pub(crate) fn store(&self) -> &Arc<P> {
        &self.store
    }

    /// Load the profile and permissions for an identity and compose the
    /// Session. `ProfileNotFound` is returned only after the retry budget
    /// is exhausted; a permissions failure degrades to an empty set.
    pub async fn load(&self, identity: &Identity) -> AuthResult<Session> {
        let profile = self.fetch_profile_with_retry(&identity.user_id).await?;
        let permissions = self.fetch_permissions_degraded(&identity.user_id, &profile).await;

        Ok(Session::compose(identity.clone(), profile, permissions))
    }

    /// Profile records for provider-created accounts are provisioned
    /// asynchronously; a missing record right after sign-up is an expected
    /// race, so wait it out within the retry budget.
    async fn fetch_profile_with_retry(&self, user_id: &str) -> AuthResult<Profile> {
        let mut attempt = 0u32;
        loop {
            let fetched = timeout(self.fetch_timeout, self.store.fetch_profile(user_id))
                .await
                .map_err(|_| AuthError::Network("profile fetch timed out".to_string()))??;

            match fetched {
                Some(profile) => return Ok(profile),
                None if self.retry.has_next(attempt) => {
                    tracing::debug!(
                        user_id,
                        attempt,
                        "Profile not provisioned yet, backing off"
                    );
                    self.retry.wait_after(attempt).await;
                    attempt += 1;
                }
                None => {
                    tracing::info!(
                        user_id,
                        attempts = attempt + 1,
                        "Profile still missing after retries"
                    );
                    return Err(AuthError::ProfileNotFound);
                }
            }
        }
    }

    async fn fetch_permissions_degraded(&self, user_id: &str, profile: &Profile) -> PermissionSet {
        let fetched = timeout(self.fetch_timeout, self.store.fetch_permissions(user_id)).await;

        match fetched {
            Ok(Ok(grants)) => PermissionSet::new(profile.role, grants),
            Ok(Err(err)) => {
                tracing::warn!(user_id, error = %err, "Permission load failed, degrading to empty set");
                PermissionSet::empty(profile.role)
            }
            Err(_) => {
                tracing::warn!(user_id, "Permission load timed out, degrading to empty set");
                PermissionSet::empty(profile.role)
            }
        }
    }
}
