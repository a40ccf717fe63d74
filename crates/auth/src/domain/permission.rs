//! Permission Set
//!
//! Capabilities derived from a loaded profile. Pure and synchronous:
//! recomputed on every profile load, never cached across identities,
//! queryable at arbitrary frequency.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::value_object::role::Role;

/// Capability that grants everything
pub const ADMIN_PERMISSION: &str = "admin";

/// Unordered capability set plus the role label it was derived from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionSet {
    role: Role,
    grants: HashSet<String>,
}

impl PermissionSet {
    pub fn new(role: Role, grants: impl IntoIterator<Item = String>) -> Self {
        Self {
            role,
            grants: grants.into_iter().collect(),
        }
    }

    /// Degraded set used when permission loading fails: the role survives,
    /// the capability list is empty.
    pub fn empty(role: Role) -> Self {
        Self {
            role,
            grants: HashSet::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// True iff the set contains the capability or the admin override
    pub fn has_permission(&self, permission: &str) -> bool {
        self.grants.contains(permission) || self.grants.contains(ADMIN_PERMISSION)
    }

    /// True iff the role is admin or the set contains the admin capability
    pub fn is_admin(&self) -> bool {
        self.role.is_admin() || self.grants.contains(ADMIN_PERMISSION)
    }

    /// The capability strings, in no particular order
    pub fn grants(&self) -> impl Iterator<Item = &str> {
        self.grants.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }
}
