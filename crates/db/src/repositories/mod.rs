use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use ordermate_core::domain::session::SessionKey;
use ordermate_core::ports::PortError;

pub mod catalog;
pub mod memory;
pub mod order;
pub mod session;

pub use catalog::SqlCatalogRepository;
pub use memory::{InMemoryCatalog, InMemoryOrderSink, InMemorySessionRepository};
pub use order::SqlOrderRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for PortError {
    fn from(error: RepositoryError) -> Self {
        PortError::Unavailable(error.to_string())
    }
}

/// A session row as persisted. The payload stays encoded so a record that
/// no longer decodes can be replaced instead of failing the turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredSession {
    pub version: i64,
    pub state_json: String,
    pub last_active: DateTime<Utc>,
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find(&self, key: &SessionKey) -> Result<Option<StoredSession>, RepositoryError>;

    /// Creates version 1. Returns `false` when the key already exists.
    async fn insert(
        &self,
        key: &SessionKey,
        state_json: &str,
        last_active: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Writes `expected_version + 1` only if the row is still at
    /// `expected_version`.
    async fn compare_and_swap(
        &self,
        key: &SessionKey,
        expected_version: i64,
        state_json: &str,
        last_active: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

/// Fixed-width UTC timestamps so stored values order lexically.
pub(crate) fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("timestamp `{value}`: {e}")))
}
