//! PostgreSQL key repository implementation
//!
//! The transactional store adapter. Consume and revoke run a
//! `SELECT ... FOR UPDATE` transaction with exactly one transaction attempt
//! per outer try; contention is absorbed by the bounded retry loop around
//! every operation. The document identifier is the raw key itself, which is
//! why access to this table must be locked down to the service account.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tokio::time::timeout;
use tracing::Instrument;

use crate::domain::api_key::{KeyRecord, KeyRepository, KeyType};
use crate::domain::DomainError;

const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

pub const DEFAULT_TABLE: &str = "api_keys";

/// SQLSTATE classes worth retrying: serialization failure, deadlock,
/// lock unavailable, query canceled, server starting up.
const RETRYABLE_SQLSTATES: [&str; 5] = ["40001", "40P01", "55P03", "57014", "57P03"];

#[derive(Debug)]
pub struct PostgresKeyRepository {
    pool: PgPool,
    table: String,
}

impl PostgresKeyRepository {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self, DomainError> {
        let table = table.into();
        let table = if table.is_empty() {
            DEFAULT_TABLE.to_string()
        } else {
            table
        };
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }

    /// Create the key table and its expiry index if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                label TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                max_usage INT NOT NULL,
                remaining_usage INT NOT NULL,
                revoked_at TIMESTAMPTZ
            )
            "#,
            table = self.table
        );
        sqlx::query(&create)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        let index = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_expires_at ON {table} (expires_at)",
            table = self.table
        );
        sqlx::query(&index)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn with_retries<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0u32;
        loop {
            let span = tracing::info_span!("store_op", op, attempt);
            let err = match timeout(REQUEST_TIMEOUT, f().instrument(span)).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => DomainError::store_transient(format!("{op} timed out")),
            };

            attempt += 1;
            if !err.is_retryable() || attempt >= MAX_RETRIES {
                return Err(err);
            }

            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    async fn create_once(&self, record: &KeyRecord) -> Result<(), DomainError> {
        let sql = format!(
            r#"
            INSERT INTO {} (key, type, label, created_at, expires_at, max_usage, remaining_usage, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
            self.table
        );
        sqlx::query(&sql)
            .bind(&record.key)
            .bind(record.kind.as_str())
            .bind(&record.label)
            .bind(record.created_at)
            .bind(record.expires_at)
            .bind(record.max_usage as i32)
            .bind(record.remaining_usage as i32)
            .bind(record.revoked_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn get_once(&self, key: &str) -> Result<KeyRecord, DomainError> {
        let sql = format!("SELECT * FROM {} WHERE key = $1", self.table);
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        match row {
            Some(row) => decode_row(&row),
            None => Err(DomainError::KeyNotFound),
        }
    }

    async fn consume_once(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, DomainError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let select = format!("SELECT * FROM {} WHERE key = $1 FOR UPDATE", self.table);
        let row = sqlx::query(&select)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        // Dropping the transaction on the error paths rolls it back; the
        // record is never mutated on a failed check.
        let record = match row {
            Some(row) => decode_row(&row)?,
            None => return Err(DomainError::KeyNotFound),
        };

        if record.revoked_at.is_some() {
            return Err(DomainError::KeyRevoked);
        }
        if record.is_expired(now) {
            return Err(DomainError::KeyExpired);
        }
        if record.remaining_usage == 0 {
            return Err(DomainError::KeyExhausted);
        }

        let update = format!(
            "UPDATE {} SET remaining_usage = remaining_usage - 1 WHERE key = $1",
            self.table
        );
        sqlx::query(&update)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        tx.commit().await.map_err(map_sqlx_err)?;

        let mut updated = record;
        updated.remaining_usage -= 1;
        Ok(updated)
    }

    async fn revoke_once(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, DomainError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let select = format!("SELECT * FROM {} WHERE key = $1 FOR UPDATE", self.table);
        let row = sqlx::query(&select)
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        let record = match row {
            Some(row) => decode_row(&row)?,
            None => return Err(DomainError::KeyNotFound),
        };

        // Already revoked: keep the earliest timestamp, write nothing.
        if record.revoked_at.is_some() {
            return Ok(record);
        }

        let update = format!(
            "UPDATE {} SET remaining_usage = 0, revoked_at = $2 WHERE key = $1",
            self.table
        );
        sqlx::query(&update)
            .bind(key)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        tx.commit().await.map_err(map_sqlx_err)?;

        let mut updated = record;
        updated.remaining_usage = 0;
        updated.revoked_at = Some(now);
        Ok(updated)
    }

    async fn delete_once(&self, key: &str) -> Result<(), DomainError> {
        let sql = format!("DELETE FROM {} WHERE key = $1", self.table);
        sqlx::query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn delete_expired_once(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<u64, DomainError> {
        let sql = format!(
            r#"
            DELETE FROM {table}
            WHERE key IN (
                SELECT key FROM {table} WHERE expires_at <= $1 ORDER BY expires_at LIMIT $2
            )
            "#,
            table = self.table
        );
        let result = sqlx::query(&sql)
            .bind(now)
            .bind(limit as i64)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn count_active_once(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        let sql = format!(
            r#"
            SELECT COUNT(*) AS count FROM {}
            WHERE revoked_at IS NULL AND expires_at > $1 AND remaining_usage > 0
            "#,
            self.table
        );
        let row = sqlx::query(&sql)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        let count: i64 = row.try_get("count").map_err(map_sqlx_err)?;
        Ok(count as u64)
    }
}

#[async_trait]
impl KeyRepository for PostgresKeyRepository {
    async fn create(&self, record: KeyRecord) -> Result<(), DomainError> {
        self.with_retries("create_temporary_key", || self.create_once(&record))
            .await
    }

    async fn get(&self, key: &str) -> Result<KeyRecord, DomainError> {
        self.with_retries("get_temporary_key", || self.get_once(key))
            .await
    }

    async fn consume(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, DomainError> {
        self.with_retries("consume_temporary_key", || self.consume_once(key, now))
            .await
    }

    async fn revoke(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, DomainError> {
        self.with_retries("revoke_temporary_key", || self.revoke_once(key, now))
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), DomainError> {
        self.with_retries("delete_temporary_key", || self.delete_once(key))
            .await
    }

    async fn delete_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<u64, DomainError> {
        self.with_retries("delete_expired_keys", || {
            self.delete_expired_once(now, limit)
        })
        .await
    }

    async fn count_active(&self, now: DateTime<Utc>) -> Result<u64, DomainError> {
        self.with_retries("count_active_keys", || self.count_active_once(now))
            .await
    }
}

fn decode_row(row: &PgRow) -> Result<KeyRecord, DomainError> {
    let kind: String = row.try_get("type").map_err(map_sqlx_err)?;
    let kind = match kind.as_str() {
        "temporary" => KeyType::Temporary,
        other => {
            return Err(DomainError::storage(format!(
                "unknown key type in store: {other}"
            )))
        }
    };

    let max_usage: i32 = row.try_get("max_usage").map_err(map_sqlx_err)?;
    let remaining_usage: i32 = row.try_get("remaining_usage").map_err(map_sqlx_err)?;

    Ok(KeyRecord {
        key: row.try_get("key").map_err(map_sqlx_err)?,
        kind,
        label: row.try_get("label").map_err(map_sqlx_err)?,
        created_at: row.try_get("created_at").map_err(map_sqlx_err)?,
        expires_at: row.try_get("expires_at").map_err(map_sqlx_err)?,
        max_usage: max_usage.max(0) as u32,
        remaining_usage: remaining_usage.max(0) as u32,
        revoked_at: row.try_get("revoked_at").map_err(map_sqlx_err)?,
    })
}

fn map_sqlx_err(err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            if code == "23505" {
                return DomainError::DuplicateKey;
            }
            if is_retryable_sqlstate(&code) {
                return DomainError::store_transient(db.to_string());
            }
            DomainError::storage(db.to_string())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => DomainError::store_transient(err.to_string()),
        sqlx::Error::RowNotFound => DomainError::KeyNotFound,
        _ => DomainError::storage(err.to_string()),
    }
}

fn is_retryable_sqlstate(code: &str) -> bool {
    // Connection-class errors are all retryable.
    RETRYABLE_SQLSTATES.contains(&code) || code.starts_with("08")
}

fn validate_table_name(name: &str) -> Result<(), DomainError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "invalid table name: {name:?}"
        )))
    }
}
