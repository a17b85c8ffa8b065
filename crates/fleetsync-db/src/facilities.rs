//! Database operations for the `facilities` table.

use chrono::{DateTime, Utc};
use fleetsync_core::Facility;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `facilities` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FacilityRow {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub coordinate: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl From<FacilityRow> for Facility {
    fn from(row: FacilityRow) -> Self {
        Facility {
            id: row.id,
            name: row.name,
            code: row.code,
            coordinate: row.coordinate,
            last_updated: row.last_updated,
        }
    }
}

/// Returns every stored facility ordered by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_facilities(pool: &PgPool) -> Result<Vec<FacilityRow>, DbError> {
    let rows = sqlx::query_as::<_, FacilityRow>(
        "SELECT id, name, code, coordinate, last_updated \
         FROM facilities \
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches the facility with the given `code`. When the source reused a code,
/// the lowest `id` wins.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_facility_by_code(
    pool: &PgPool,
    code: &str,
) -> Result<Option<FacilityRow>, DbError> {
    let row = sqlx::query_as::<_, FacilityRow>(
        "SELECT id, name, code, coordinate, last_updated \
         FROM facilities \
         WHERE code = $1 \
         ORDER BY id \
         LIMIT 1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Replaces the whole `facilities` table with `facilities` in one transaction.
///
/// Readers see either the previous or the new collection, never an empty
/// table in between. Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is then
/// rolled back and the previous rows are kept.
pub async fn replace_facilities(pool: &PgPool, facilities: &[Facility]) -> Result<u64, DbError> {
    let mut ids: Vec<i64> = Vec::with_capacity(facilities.len());
    let mut names: Vec<String> = Vec::with_capacity(facilities.len());
    let mut codes: Vec<String> = Vec::with_capacity(facilities.len());
    let mut coordinates: Vec<Option<String>> = Vec::with_capacity(facilities.len());
    let mut updated: Vec<DateTime<Utc>> = Vec::with_capacity(facilities.len());

    for facility in facilities {
        ids.push(facility.id);
        names.push(facility.name.clone());
        codes.push(facility.code.clone());
        coordinates.push(facility.coordinate.clone());
        updated.push(facility.last_updated);
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM facilities")
        .execute(&mut *tx)
        .await?;

    let inserted = sqlx::query(
        "INSERT INTO facilities (id, name, code, coordinate, last_updated) \
         SELECT * FROM UNNEST($1::int8[], $2::text[], $3::text[], $4::text[], $5::timestamptz[])",
    )
    .bind(&ids)
    .bind(&names)
    .bind(&codes)
    .bind(&coordinates)
    .bind(&updated)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    tracing::debug!(rows = inserted, "replaced facilities");
    Ok(inserted)
}
