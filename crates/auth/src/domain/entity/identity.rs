//! Identity Entity
//!
//! The credential-backed principal returned by the identity backend.
//! Constructed only at the gateway boundary from validated wire data;
//! immutable for the lifetime of a session, discarded on sign-out.

use serde::{Deserialize, Serialize};

use crate::domain::value_object::{email::Email, provider::Provider};

/// Identity entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque backend identifier
    pub user_id: String,
    /// Email the credential is bound to
    pub email: Email,
    /// Whether the backend has confirmed the email address.
    /// Informational: it does not gate sign-in.
    pub email_verified: bool,
    /// Identity method that produced this Identity
    pub provider: Provider,
    /// Display name claim from the provider, if any
    pub display_name: Option<String>,
    /// Avatar URL claim from the provider, if any
    pub avatar_url: Option<String>,
}
