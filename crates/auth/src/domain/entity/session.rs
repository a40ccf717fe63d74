//! Session Entity
//!
//! The composite "currently signed-in user": Identity + Profile +
//! PermissionSet + a freshness flag. At most one Session exists at a time;
//! the state machine is the only writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{identity::Identity, profile::Profile};
use crate::domain::permission::PermissionSet;

/// Session entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    pub profile: Profile,
    pub permissions: PermissionSet,
    /// False when rehydrated from the advisory snapshot; such a session must
    /// never be used for authorization decisions.
    pub fresh: bool,
}

impl Session {
    /// Compose a fresh session from a verified identity and loaded profile
    pub fn compose(identity: Identity, profile: Profile, permissions: PermissionSet) -> Self {
        Self {
            identity,
            profile,
            permissions,
            fresh: true,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.has_permission(permission)
    }

    pub fn is_admin(&self) -> bool {
        self.permissions.is_admin()
    }

    /// Best display name: profile name, then provider claim, then username
    pub fn display_name(&self) -> String {
        if self.profile.first_name.is_some() || self.profile.last_name.is_some() {
            return self.profile.display_name();
        }
        self.identity
            .display_name
            .clone()
            .unwrap_or_else(|| self.profile.username.clone())
    }
}

/// Serialized, best-effort copy of the last good Session.
///
/// Written to durable storage on every profile load and deleted on
/// sign-out. Advisory only: used to pre-populate UI before the
/// authoritative session is re-verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub session: Session,
    pub saved_at: DateTime<Utc>,
}

impl CachedSnapshot {
    pub fn of(session: &Session) -> Self {
        let mut session = session.clone();
        session.fresh = false;
        Self {
            session,
            saved_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::{email::Email, provider::Provider, role::Role};

    fn session() -> Session {
        let identity = Identity {
            user_id: "uid-1".to_string(),
            email: Email::new("ada@x.com").unwrap(),
            email_verified: true,
            provider: Provider::Password,
            display_name: Some("Ada from Google".to_string()),
            avatar_url: None,
        };
        let profile = Profile {
            username: "ada".to_string(),
            first_name: None,
            last_name: None,
            company: None,
            job_title: None,
            department: None,
            phone: None,
            country: None,
            role: Role::User,
            created_at: Utc::now(),
            last_login_at: None,
        };
        Session::compose(identity, profile, PermissionSet::empty(Role::User))
    }

    #[test]
    fn test_composed_session_is_fresh() {
        assert!(session().fresh);
    }

    #[test]
    fn test_snapshot_is_never_fresh() {
        let snapshot = CachedSnapshot::of(&session());
        assert!(!snapshot.session.fresh);
    }

    #[test]
    fn test_display_name_prefers_profile_then_claim() {
        let mut s = session();
        assert_eq!(s.display_name(), "Ada from Google");

        s.profile.first_name = Some("Ada".to_string());
        assert_eq!(s.display_name(), "Ada");

        s.profile.first_name = None;
        s.identity.display_name = None;
        assert_eq!(s.display_name(), "ada");
    }
}
