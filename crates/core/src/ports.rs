//! Collaborator seams consumed by the conversation pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::menu::Menu;
use crate::domain::order::{OrderId, OrderProjection};
use crate::domain::session::{Session, SessionKey};
use crate::domain::tenant::{TenantConfig, TenantId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator timed out after {0} ms")]
    Timeout(u64),
    #[error("collaborator rejected the request: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait MenuProvider: Send + Sync {
    async fn get(&self, tenant_id: &TenantId) -> Result<Option<Menu>, PortError>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find(&self, tenant_id: &TenantId) -> Result<Option<TenantConfig>, PortError>;
}

#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Submissions carry a stable `order_ref`; a sink must treat a repeated
    /// ref as the same order.
    async fn submit(&self, order: &OrderProjection) -> Result<OrderId, PortError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("session backend failure: {0}")]
    Backend(String),
    #[error("session `{key}` kept changing underneath {attempts} save attempts")]
    Conflict { key: String, attempts: u32 },
}

pub type SessionMutator<'a> = &'a (dyn Fn(&mut Session) + Send + Sync);

/// Exclusive claim on one session key for the length of a turn.
#[derive(Debug)]
pub struct SessionGuard {
    _permit: OwnedMutexGuard<()>,
}

impl SessionGuard {
    pub async fn lock(slot: Arc<Mutex<()>>) -> Self {
        Self { _permit: slot.lock_owned().await }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Serialises turns on the same key within this process.
    async fn acquire(&self, key: &SessionKey) -> SessionGuard;

    /// Never fails: absent, undecodable or expired records come back fresh.
    async fn load(&self, key: &SessionKey) -> Session;

    /// Applies `mutator` to the latest record and persists it with an
    /// optimistic version check, re-applying on conflict.
    async fn save(
        &self,
        key: &SessionKey,
        mutator: SessionMutator<'_>,
    ) -> Result<Session, SessionStoreError>;

    async fn sweep_expired(&self) -> Result<usize, SessionStoreError>;
}
