pub mod http_gateway;
pub mod http_profile;
pub mod snapshot;

pub use http_gateway::HttpIdentityGateway;
pub use http_profile::HttpProfileStore;
pub use snapshot::FileSnapshotStore;
