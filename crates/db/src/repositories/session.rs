use chrono::{DateTime, Utc};
use sqlx::Row;

use ordermate_core::domain::session::SessionKey;

use super::{parse_timestamp, timestamp, RepositoryError, SessionRepository, StoredSession};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_stored(row: &sqlx::sqlite::SqliteRow) -> Result<StoredSession, RepositoryError> {
    let version: i64 = row.try_get("version").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let state_json: String =
        row.try_get("state_json").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_active: String =
        row.try_get("last_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(StoredSession { version, state_json, last_active: parse_timestamp(&last_active)? })
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find(&self, key: &SessionKey) -> Result<Option<StoredSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT version, state_json, last_active
             FROM chat_session WHERE tenant_id = ? AND user_id = ?",
        )
        .bind(&key.tenant_id.0)
        .bind(&key.user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_stored).transpose()
    }

    async fn insert(
        &self,
        key: &SessionKey,
        state_json: &str,
        last_active: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO chat_session (tenant_id, user_id, version, state_json, last_active)
             VALUES (?, ?, 1, ?, ?)
             ON CONFLICT(tenant_id, user_id) DO NOTHING",
        )
        .bind(&key.tenant_id.0)
        .bind(&key.user_id.0)
        .bind(state_json)
        .bind(timestamp(last_active))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn compare_and_swap(
        &self,
        key: &SessionKey,
        expected_version: i64,
        state_json: &str,
        last_active: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE chat_session
             SET version = version + 1, state_json = ?, last_active = ?
             WHERE tenant_id = ? AND user_id = ? AND version = ?",
        )
        .bind(state_json)
        .bind(timestamp(last_active))
        .bind(&key.tenant_id.0)
        .bind(&key.user_id.0)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_session WHERE last_active < ?")
            .bind(timestamp(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use ordermate_core::domain::session::SessionKey;

    use super::SqlSessionRepository;
    use crate::repositories::SessionRepository;
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlSessionRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlSessionRepository::new(pool)
    }

    #[tokio::test]
    async fn versions_advance_only_from_the_expected_value() {
        let repo = repository().await;
        let key = SessionKey::new("bistro", "u1");
        let now = Utc::now();

        assert!(repo.insert(&key, "{}", now).await.expect("insert"));
        assert!(!repo.insert(&key, "{}", now).await.expect("second insert"));

        assert!(repo.compare_and_swap(&key, 1, r#"{"v":2}"#, now).await.expect("cas"));
        assert!(!repo.compare_and_swap(&key, 1, r#"{"v":3}"#, now).await.expect("stale cas"));

        let stored = repo.find(&key).await.expect("find").expect("row");
        assert_eq!(stored.version, 2);
        assert_eq!(stored.state_json, r#"{"v":2}"#);
    }

    #[tokio::test]
    async fn idle_rows_are_deleted() {
        let repo = repository().await;
        let now = Utc::now();
        repo.insert(&SessionKey::new("bistro", "idle"), "{}", now - Duration::minutes(30))
            .await
            .expect("insert idle");
        repo.insert(&SessionKey::new("bistro", "active"), "{}", now).await.expect("insert active");

        let removed = repo.delete_idle_before(now - Duration::minutes(10)).await.expect("sweep");

        assert_eq!(removed, 1);
        assert!(repo.find(&SessionKey::new("bistro", "idle")).await.expect("find").is_none());
        assert!(repo.find(&SessionKey::new("bistro", "active")).await.expect("find").is_some());
    }
}
