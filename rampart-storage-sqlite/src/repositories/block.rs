//! SQLite implementation of the block repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rampart_core::{
    Error,
    block::{BlockDuration, BlockRecord, BlockStatus, NewBlock},
    error::StorageError,
    repositories::{BlockRepository, ReasonCount},
};
use sqlx::SqlitePool;

/// SQLite repository for block records.
pub struct SqliteBlockRepository {
    pool: SqlitePool,
}

impl SqliteBlockRepository {
    /// Create a new SQLite block repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const BLOCK_COLUMNS: &str = "id, ip_address, status, blocked_at, duration, expires_at, reason, source, attempts_count, created_at, updated_at";

/// Internal struct for query results
#[derive(Debug, Clone, sqlx::FromRow)]
struct SqliteBlockRow {
    id: i64,
    ip_address: String,
    status: String,
    blocked_at: i64,
    duration: i64,
    expires_at: Option<i64>,
    reason: String,
    source: String,
    attempts_count: i64,
    created_at: i64,
    updated_at: i64,
}

impl From<SqliteBlockRow> for BlockRecord {
    fn from(row: SqliteBlockRow) -> Self {
        BlockRecord {
            id: row.id,
            status: BlockStatus::parse(&row.status).expect("Invalid block status"),
            key: row.ip_address,
            blocked_at: DateTime::from_timestamp(row.blocked_at, 0).expect("Invalid timestamp"),
            duration: BlockDuration::from_secs(row.duration).expect("Invalid duration"),
            expires_at: row
                .expires_at
                .map(|ts| DateTime::from_timestamp(ts, 0).expect("Invalid timestamp")),
            reason: row.reason,
            source: row.source,
            attempts_count: row.attempts_count,
            created_at: DateTime::from_timestamp(row.created_at, 0).expect("Invalid timestamp"),
            updated_at: DateTime::from_timestamp(row.updated_at, 0).expect("Invalid timestamp"),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SqliteReasonCount {
    reason: String,
    count: i64,
}

#[async_trait]
impl BlockRepository for SqliteBlockRepository {
    async fn find_active(&self, key: &str) -> Result<Option<BlockRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteBlockRow>(
            r#"
            SELECT * FROM blocked_ips
            WHERE ip_address = ?1 AND status = 'active'
            ORDER BY blocked_at DESC
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to look up active block");
            StorageError::Database(e.to_string())
        })?;

        Ok(row.map(Into::into))
    }

    async fn insert(&self, block: &NewBlock) -> Result<BlockRecord, Error> {
        let row = sqlx::query_as::<_, SqliteBlockRow>(&format!(
            r#"
            INSERT INTO blocked_ips (ip_address, status, blocked_at, duration, expires_at, reason, source, attempts_count, created_at, updated_at)
            VALUES (?1, 'active', ?2, ?3, ?4, ?5, ?6, 1, ?2, ?2)
            RETURNING {BLOCK_COLUMNS}
            "#
        ))
        .bind(&block.key)
        .bind(block.blocked_at.timestamp())
        .bind(block.duration.as_secs())
        .bind(block.expires_at.map(|at| at.timestamp()))
        .bind(&block.reason)
        .bind(&block.source)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            // The partial unique index on (ip_address) WHERE status='active'
            // lost a race with a concurrent insert.
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Storage(StorageError::DuplicateActiveKey(block.key.clone()))
            }
            _ => {
                tracing::error!(error = %e, "Failed to insert block record");
                Error::Storage(StorageError::Database(e.to_string()))
            }
        })?;

        Ok(row.into())
    }

    async fn update_active(
        &self,
        id: i64,
        duration: BlockDuration,
        expires_at: Option<DateTime<Utc>>,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<BlockRecord, Error> {
        let row = sqlx::query_as::<_, SqliteBlockRow>(&format!(
            r#"
            UPDATE blocked_ips
            SET duration = ?2, expires_at = ?3, reason = ?4,
                attempts_count = attempts_count + 1, blocked_at = ?5, updated_at = ?5
            WHERE id = ?1 AND status = 'active'
            RETURNING {BLOCK_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(duration.as_secs())
        .bind(expires_at.map(|at| at.timestamp()))
        .bind(reason)
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update active block");
            StorageError::Database(e.to_string())
        })?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(StorageError::NotFound.into()),
        }
    }

    async fn mark_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE blocked_ips
            SET status = 'expired', updated_at = ?1
            WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= ?1
            "#,
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to mark expired blocks");
            StorageError::Database(e.to_string())
        })?;

        Ok(result.rows_affected())
    }

    async fn mark_removed(&self, key: &str, now: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE blocked_ips
            SET status = 'manually_removed', updated_at = ?2
            WHERE ip_address = ?1 AND status = 'active'
            "#,
        )
        .bind(key)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to remove block");
            StorageError::Database(e.to_string())
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_all_active(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE blocked_ips
            SET status = 'manually_removed', updated_at = ?1
            WHERE status = 'active'
            "#,
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to remove all active blocks");
            StorageError::Database(e.to_string())
        })?;

        Ok(result.rows_affected())
    }

    async fn list(
        &self,
        status: Option<BlockStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<BlockRecord>, Error> {
        let query = match status {
            Some(status) => sqlx::query_as::<_, SqliteBlockRow>(
                r#"
                SELECT * FROM blocked_ips
                WHERE status = ?1
                ORDER BY blocked_at DESC
                LIMIT ?2 OFFSET ?3
                "#,
            )
            .bind(status.as_str())
            .bind(limit as i64)
            .bind(offset as i64),
            None => sqlx::query_as::<_, SqliteBlockRow>(
                r#"
                SELECT * FROM blocked_ips
                ORDER BY blocked_at DESC
                LIMIT ?1 OFFSET ?2
                "#,
            )
            .bind(limit as i64)
            .bind(offset as i64),
        };

        let rows = query.fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to list blocks");
            StorageError::Database(e.to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn history(&self, key: &str, limit: u32) -> Result<Vec<BlockRecord>, Error> {
        let rows = sqlx::query_as::<_, SqliteBlockRow>(
            r#"
            SELECT * FROM blocked_ips
            WHERE ip_address = ?1
            ORDER BY blocked_at DESC
            LIMIT ?2
            "#,
        )
        .bind(key)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load block history");
            StorageError::Database(e.to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn episode_count(&self, key: &str) -> Result<u64, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blocked_ips WHERE ip_address = ?1")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to count block episodes");
                StorageError::Database(e.to_string())
            })?;

        Ok(count as u64)
    }

    async fn count_by_status(&self, status: BlockStatus) -> Result<u64, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blocked_ips WHERE status = ?1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to count blocks by status");
                StorageError::Database(e.to_string())
            })?;

        Ok(count as u64)
    }

    async fn count_blocked_since(&self, since: DateTime<Utc>) -> Result<u64, Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM blocked_ips WHERE blocked_at >= ?1")
                .bind(since.timestamp())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to count recent blocks");
                    StorageError::Database(e.to_string())
                })?;

        Ok(count as u64)
    }

    async fn count_by_reason(&self, limit: u32) -> Result<Vec<ReasonCount>, Error> {
        let rows = sqlx::query_as::<_, SqliteReasonCount>(
            r#"
            SELECT reason, COUNT(*) as count FROM blocked_ips
            WHERE status = 'active' AND reason != ''
            GROUP BY reason
            ORDER BY count DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to aggregate block reasons");
            StorageError::Database(e.to_string())
        })?;

        Ok(rows
            .into_iter()
            .map(|row| ReasonCount {
                reason: row.reason,
                count: row.count as u64,
            })
            .collect())
    }

    async fn recent_blocks(&self, limit: u32) -> Result<Vec<BlockRecord>, Error> {
        let rows = sqlx::query_as::<_, SqliteBlockRow>(
            r#"
            SELECT * FROM blocked_ips
            WHERE status = 'active'
            ORDER BY blocked_at DESC
            LIMIT ?1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to load recent blocks");
            StorageError::Database(e.to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
