use serde::{Deserialize, Serialize};
use std::fmt;

/// Application role attached to a profile.
///
/// The backend stores roles as free-form codes; unknown codes degrade to
/// `User` rather than failing the profile load, because a client must keep
/// working when the backend grows new roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "user" => Role::User,
            "admin" => Role::Admin,
            other => {
                tracing::warn!(code = %other, "Unknown role code, defaulting to user");
                Role::User
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
