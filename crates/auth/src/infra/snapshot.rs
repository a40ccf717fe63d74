//! File Snapshot Store
//!
//! Durable home of the advisory session snapshot: one namespaced JSON file
//! with owner-only permissions. A record that no longer parses is treated
//! as absent and removed, never surfaced as an error.

use crate::domain::entity::session::CachedSnapshot;
use crate::domain::gateway::SnapshotStore;
use crate::error::AuthResult;
use platform::storage::{JsonStore, StorageError};

/// Storage key for the session snapshot
const KEY_SESSION: &str = "session";

/// File-backed snapshot store
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    storage: JsonStore,
}

impl FileSnapshotStore {
    pub fn new(storage: JsonStore) -> Self {
        Self { storage }
    }
}

impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> AuthResult<Option<CachedSnapshot>> {
        match self.storage.load::<CachedSnapshot>(KEY_SESSION) {
            Ok(snapshot) => Ok(snapshot),
            Err(StorageError::Corrupt { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "Discarding corrupt session snapshot");
                self.storage.delete(KEY_SESSION)?;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn store(&self, snapshot: &CachedSnapshot) -> AuthResult<()> {
        self.storage.save(KEY_SESSION, snapshot)?;
        Ok(())
    }

    async fn clear(&self) -> AuthResult<()> {
        self.storage.delete(KEY_SESSION)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{identity::Identity, profile::Profile, session::Session};
    use crate::domain::permission::PermissionSet;
    use crate::domain::value_object::{email::Email, provider::Provider, role::Role};
    use chrono::Utc;

    fn session() -> Session {
        let identity = Identity {
            user_id: "uid-1".to_string(),
            email: Email::new("ada@x.com").unwrap(),
            email_verified: true,
            provider: Provider::Password,
            display_name: None,
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

    fn store() -> (tempfile::TempDir, FileSnapshotStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(JsonStore::new(dir.path(), "auth-test"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_round_trip_marks_stale() {
        let (_dir, store) = store();

        store.store(&CachedSnapshot::of(&session())).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.session.identity.user_id, "uid-1");
        assert!(!loaded.session.fresh);
    }

    #[tokio::test]
    async fn test_clear_then_load_is_none() {
        let (_dir, store) = store();

        store.store(&CachedSnapshot::of(&session())).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_without_snapshot_is_fine() {
        let (_dir, store) = store();
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonStore::new(dir.path(), "auth-test");
        storage.save("session", &"not a snapshot").unwrap();

        let store = FileSnapshotStore::new(storage);
        assert!(store.load().await.unwrap().is_none());
        // And the bad record is gone
        assert!(store.load().await.unwrap().is_none());
    }
}
