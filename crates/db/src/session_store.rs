//! Session persistence with per-key turn serialisation and optimistic
//! versioning.
//!
//! Within one process, `acquire` queues turns for the same key. Across
//! processes the version column is the only guard: `save` re-reads the row,
//! re-applies the turn's mutator and retries the swap a bounded number of
//! times.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use ordermate_core::domain::session::{Session, SessionKey};
use ordermate_core::ports::{SessionGuard, SessionMutator, SessionStore, SessionStoreError};

use crate::repositories::{InMemorySessionRepository, SessionRepository, SqlSessionRepository};
use crate::DbPool;

pub const DEFAULT_SAVE_ATTEMPTS: u32 = 5;

pub struct VersionedSessionStore<R> {
    repository: R,
    ttl: Duration,
    max_attempts: u32,
    locks: Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>,
}

impl VersionedSessionStore<InMemorySessionRepository> {
    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(InMemorySessionRepository::default(), ttl)
    }
}

impl VersionedSessionStore<SqlSessionRepository> {
    pub fn sqlite(pool: DbPool, ttl: Duration) -> Self {
        Self::new(SqlSessionRepository::new(pool), ttl)
    }
}

impl<R: SessionRepository> VersionedSessionStore<R> {
    pub fn new(repository: R, ttl: Duration) -> Self {
        Self { repository, ttl, max_attempts: DEFAULT_SAVE_ATTEMPTS, locks: Mutex::new(HashMap::new()) }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Latest decodable, unexpired state plus the version it was read at.
    /// Unusable rows keep their version so the next save replaces them.
    async fn read(&self, key: &SessionKey) -> Result<(Session, Option<i64>), SessionStoreError> {
        let now = Utc::now();
        let stored = self
            .repository
            .find(key)
            .await
            .map_err(|e| SessionStoreError::Backend(e.to_string()))?;
        let Some(stored) = stored else {
            return Ok((Session::new(key.clone(), now), None));
        };

        let session = match serde_json::from_str::<Session>(&stored.state_json) {
            Ok(mut session) if !session.is_expired(now, self.ttl) => {
                session.key = key.clone();
                session
            }
            Ok(_) => {
                debug!(
                    event_name = "session.expired",
                    session_key = %key,
                    "idle session expired, starting fresh"
                );
                Session::new(key.clone(), now)
            }
            Err(error) => {
                warn!(
                    event_name = "session.decode_failed",
                    session_key = %key,
                    version = stored.version,
                    error = %error,
                    "stored session unreadable, starting fresh"
                );
                Session::new(key.clone(), now)
            }
        };
        Ok((session, Some(stored.version)))
    }
}

#[async_trait::async_trait]
impl<R: SessionRepository> SessionStore for VersionedSessionStore<R> {
    async fn acquire(&self, key: &SessionKey) -> SessionGuard {
        let slot = {
            let mut locks = self.locks.lock().await;
            locks.entry(key.clone()).or_default().clone()
        };
        SessionGuard::lock(slot).await
    }

    async fn load(&self, key: &SessionKey) -> Session {
        match self.read(key).await {
            Ok((session, _)) => session,
            Err(error) => {
                warn!(
                    event_name = "session.load_failed",
                    session_key = %key,
                    error = %error,
                    "session backend unavailable, starting fresh"
                );
                Session::new(key.clone(), Utc::now())
            }
        }
    }

    async fn save(
        &self,
        key: &SessionKey,
        mutator: SessionMutator<'_>,
    ) -> Result<Session, SessionStoreError> {
        for attempt in 1..=self.max_attempts {
            let (mut session, version) = self.read(key).await?;
            mutator(&mut session);
            let now = Utc::now();
            session.last_active = now;

            let state_json = serde_json::to_string(&session)
                .map_err(|e| SessionStoreError::Backend(format!("encode session: {e}")))?;
            let written = match version {
                None => self.repository.insert(key, &state_json, now).await,
                Some(expected) => self.repository.compare_and_swap(key, expected, &state_json, now).await,
            }
            .map_err(|e| SessionStoreError::Backend(e.to_string()))?;

            if written {
                return Ok(session);
            }
            debug!(
                event_name = "session.save.conflict",
                session_key = %key,
                attempt,
                "session changed underneath save, re-applying"
            );
        }

        warn!(
            event_name = "session.save.exhausted",
            session_key = %key,
            attempts = self.max_attempts,
            "session save gave up after repeated conflicts"
        );
        Err(SessionStoreError::Conflict { key: key.to_string(), attempts: self.max_attempts })
    }

    async fn sweep_expired(&self) -> Result<usize, SessionStoreError> {
        let cutoff = Utc::now() - self.ttl;
        let removed = self
            .repository
            .delete_idle_before(cutoff)
            .await
            .map_err(|e| SessionStoreError::Backend(e.to_string()))?;

        let mut locks = self.locks.lock().await;
        locks.retain(|_, slot| Arc::strong_count(slot) > 1);

        if removed > 0 {
            info!(event_name = "session.sweep.completed", removed, "expired sessions removed");
        }
        Ok(removed as usize)
    }
}
