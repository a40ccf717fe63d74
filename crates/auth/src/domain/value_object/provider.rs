use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity method that authenticated the current Identity.
///
/// The backend reports this as a free-form code in provider metadata; an
/// unknown or missing code resolves to `Password`, the documented default,
/// so dynamic backend fields never leak past the gateway boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Password,
    Google,
    Github,
}

impl Provider {
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Provider::Password => "password",
            Provider::Google => "google",
            Provider::Github => "github",
        }
    }

    /// Code used on the authorize request; `None` for the password method,
    /// which has no redirect flow.
    #[inline]
    pub const fn redirect_code(&self) -> Option<&'static str> {
        match self {
            Provider::Password => None,
            Provider::Google => Some("google"),
            Provider::Github => Some("github"),
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            // The backend reports the password method as "email"
            "password" | "email" => Provider::Password,
            "google" => Provider::Google,
            "github" => Provider::Github,
            other => {
                tracing::warn!(code = %other, "Unknown provider code, defaulting to password");
                Provider::Password
            }
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
