//! Auth (Identity & Session Orchestration) Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, gateway traits
//! - `application/` - State machine, profile loader, session store, events
//! - `infra/` - HTTP identity/profile clients, file snapshot store
//!
//! ## Features
//! - Email/password sign-in and registration against a hosted identity backend
//! - Third-party sign-in (Google, GitHub) via PKCE redirect flow
//! - Profile + permission loading with bounded retries and graceful degradation
//! - Single-writer session state with broadcast of completed transitions
//! - Advisory session snapshot for instant UI pre-render at startup
//!
//! ## Trust Model
//! - Only a backend-verified identity establishes a session
//! - The cached snapshot is a rendering hint, never proof of authentication
//! - A later sign-in attempt supersedes any still-running earlier one
//! - Permission checks are pure reads against the loaded session

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::{GatewayConfig, OrchestratorConfig};
pub use application::events::{AuthEvent, AuthEvents};
pub use application::machine::{AuthOrchestrator, AuthState, RegisterInput};
pub use error::{AuthError, AuthResult};
pub use infra::{FileSnapshotStore, HttpIdentityGateway, HttpProfileStore};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::permission::*;
    pub use crate::domain::value_object::*;
}
