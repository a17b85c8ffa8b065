//! Database operations for the append-only `data_retrieval_log` table.

use chrono::{DateTime, Utc};
use fleetsync_core::{DataKind, RetrievalRecord};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `data_retrieval_log` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RetrievalLogRow {
    pub id: i64,
    /// `FACILITY` or `VEHICLE`, enforced by a check constraint.
    pub data_kind: String,
    pub attempted_at: DateTime<Utc>,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

impl TryFrom<RetrievalLogRow> for RetrievalRecord {
    type Error = DbError;

    fn try_from(row: RetrievalLogRow) -> Result<Self, Self::Error> {
        Ok(RetrievalRecord {
            id: row.id,
            kind: row.data_kind.parse::<DataKind>()?,
            attempted_at: row.attempted_at,
            succeeded: row.succeeded,
            error_message: row.error_message,
        })
    }
}

/// Appends one retrieval attempt and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_retrieval_log(
    pool: &PgPool,
    kind: DataKind,
    attempted_at: DateTime<Utc>,
    succeeded: bool,
    error_message: Option<&str>,
) -> Result<RetrievalLogRow, DbError> {
    let row = sqlx::query_as::<_, RetrievalLogRow>(
        "INSERT INTO data_retrieval_log (data_kind, attempted_at, succeeded, error_message) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, data_kind, attempted_at, succeeded, error_message",
    )
    .bind(kind.as_str())
    .bind(attempted_at)
    .bind(succeeded)
    .bind(error_message)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns `true` when a succeeded attempt for `kind` was recorded strictly
/// after `threshold`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn exists_successful_retrieval_since(
    pool: &PgPool,
    kind: DataKind,
    threshold: DateTime<Utc>,
) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (\
             SELECT 1 FROM data_retrieval_log \
             WHERE data_kind = $1 AND succeeded = TRUE AND attempted_at > $2\
         )",
    )
    .bind(kind.as_str())
    .bind(threshold)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Fetches the most recent attempt for `kind`, successful or not.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_retrieval(
    pool: &PgPool,
    kind: DataKind,
) -> Result<Option<RetrievalLogRow>, DbError> {
    let row = sqlx::query_as::<_, RetrievalLogRow>(
        "SELECT id, data_kind, attempted_at, succeeded, error_message \
         FROM data_retrieval_log \
         WHERE data_kind = $1 \
         ORDER BY attempted_at DESC, id DESC \
         LIMIT 1",
    )
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent `limit` attempts across both kinds, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_retrievals(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<RetrievalLogRow>, DbError> {
    let rows = sqlx::query_as::<_, RetrievalLogRow>(
        "SELECT id, data_kind, attempted_at, succeeded, error_message \
         FROM data_retrieval_log \
         ORDER BY attempted_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
