pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod session_store;

pub use connection::{connect, connect_from_config, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, SeedResult, VerificationResult};
pub use session_store::VersionedSessionStore;
