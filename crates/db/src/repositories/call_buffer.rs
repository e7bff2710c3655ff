use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::RepositoryError;
use crate::DbPool;

/// One buffered webhook event keyed by the PBX-issued call uuid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferedCall {
    pub call_uuid: String,
    pub raw_payload: String,
    pub status: String,
    pub crm_call_id: Option<String>,
    pub retries: i64,
}

#[async_trait]
pub trait CallBufferRepository: Send + Sync {
    /// Inserts the raw payload if the uuid is new; returns whether a row was
    /// written. Repeated deliveries of the same call are ignored.
    async fn insert_if_new(
        &self,
        call_uuid: &str,
        raw_payload: &str,
        received_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    async fn mark_sent(
        &self,
        call_uuid: &str,
        crm_call_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Records a failed push and bumps the retry counter.
    async fn mark_failed(&self, call_uuid: &str, at: DateTime<Utc>)
        -> Result<(), RepositoryError>;

    async fn find(&self, call_uuid: &str) -> Result<Option<BufferedCall>, RepositoryError>;
}

pub struct SqlCallBufferRepository {
    pool: DbPool,
}

impl SqlCallBufferRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallBufferRepository for SqlCallBufferRepository {
    async fn insert_if_new(
        &self,
        call_uuid: &str,
        raw_payload: &str,
        received_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO call_buffer (call_uuid, raw_payload, status, received_at)
             VALUES (?, ?, 'pending', ?)
             ON CONFLICT (call_uuid) DO NOTHING",
        )
        .bind(call_uuid)
        .bind(raw_payload)
        .bind(received_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_sent(
        &self,
        call_uuid: &str,
        crm_call_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE call_buffer
             SET status = 'sent', crm_call_id = ?, last_attempt = ?
             WHERE call_uuid = ?",
        )
        .bind(crm_call_id)
        .bind(at.to_rfc3339())
        .bind(call_uuid)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        call_uuid: &str,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE call_buffer
             SET status = 'failed', retries = retries + 1, last_attempt = ?
             WHERE call_uuid = ?",
        )
        .bind(at.to_rfc3339())
        .bind(call_uuid)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, call_uuid: &str) -> Result<Option<BufferedCall>, RepositoryError> {
        let row = sqlx::query(
            "SELECT call_uuid, raw_payload, status, crm_call_id, retries
             FROM call_buffer WHERE call_uuid = ?",
        )
        .bind(call_uuid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| BufferedCall {
            call_uuid: row.get("call_uuid"),
            raw_payload: row.get("raw_payload"),
            status: row.get("status"),
            crm_call_id: row.get("crm_call_id"),
            retries: row.get("retries"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{CallBufferRepository, SqlCallBufferRepository};
    use crate::{connect_with_settings, migrations};

    async fn repository() -> SqlCallBufferRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        SqlCallBufferRepository::new(pool)
    }

    #[tokio::test]
    async fn insert_is_idempotent_per_call_uuid() {
        let repository = repository().await;
        let now = Utc::now();

        assert!(repository
            .insert_if_new("uuid-1", r#"{"call_uuid":"uuid-1"}"#, now)
            .await
            .expect("first insert"));
        assert!(!repository
            .insert_if_new("uuid-1", r#"{"call_uuid":"uuid-1","replayed":true}"#, now)
            .await
            .expect("second insert"));

        let buffered = repository.find("uuid-1").await.expect("find").expect("row exists");
        assert_eq!(buffered.status, "pending");
        assert_eq!(buffered.raw_payload, r#"{"call_uuid":"uuid-1"}"#);
    }

    #[tokio::test]
    async fn mark_sent_stores_crm_id() {
        let repository = repository().await;
        let now = Utc::now();
        repository.insert_if_new("uuid-2", "{}", now).await.expect("insert");

        repository.mark_sent("uuid-2", Some("4x22"), now).await.expect("mark sent");

        let buffered = repository.find("uuid-2").await.expect("find").expect("row exists");
        assert_eq!(buffered.status, "sent");
        assert_eq!(buffered.crm_call_id.as_deref(), Some("4x22"));
        assert_eq!(buffered.retries, 0);
    }

    #[tokio::test]
    async fn mark_failed_increments_retries() {
        let repository = repository().await;
        let now = Utc::now();
        repository.insert_if_new("uuid-3", "{}", now).await.expect("insert");

        repository.mark_failed("uuid-3", now).await.expect("first failure");
        repository.mark_failed("uuid-3", now).await.expect("second failure");

        let buffered = repository.find("uuid-3").await.expect("find").expect("row exists");
        assert_eq!(buffered.status, "failed");
        assert_eq!(buffered.retries, 2);
    }
}
