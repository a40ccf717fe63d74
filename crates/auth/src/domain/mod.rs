//! Domain Layer
//!
//! Entities, value objects, the permission evaluator, and gateway traits.

pub mod entity;
pub mod gateway;
pub mod permission;
pub mod value_object;

// Re-exports
pub use entity::{identity::Identity, profile::Profile, session::Session};
pub use gateway::{IdentityGateway, ProfileStore, SnapshotStore};
pub use permission::PermissionSet;
