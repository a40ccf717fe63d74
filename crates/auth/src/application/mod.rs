pub mod config;
pub mod events;
pub mod machine;
pub mod profile_loader;
pub mod session_store;

pub use config::{GatewayConfig, OrchestratorConfig};
pub use events::{AuthEvent, AuthEvents};
pub use machine::{AuthOrchestrator, AuthState, RegisterInput};
