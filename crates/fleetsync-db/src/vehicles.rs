//! Database operations for the `vehicles` table.

use chrono::{DateTime, Utc};
use fleetsync_core::Vehicle;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `vehicles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VehicleRow {
    pub id: i64,
    pub door_number: Option<String>,
    pub operator: Option<String>,
    pub facility_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed: Option<f64>,
    pub license_plate: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub nearest_facility_code: Option<String>,
    pub nearest_facility_name: Option<String>,
    pub distance_to_nearest_facility_km: Option<f64>,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Vehicle {
            id: row.id,
            door_number: row.door_number,
            operator: row.operator,
            facility_code: row.facility_code,
            latitude: row.latitude,
            longitude: row.longitude,
            speed: row.speed,
            license_plate: row.license_plate,
            recorded_at: row.recorded_at,
            last_updated: row.last_updated,
            nearest_facility_code: row.nearest_facility_code,
            nearest_facility_name: row.nearest_facility_name,
            distance_to_nearest_facility_km: row.distance_to_nearest_facility_km,
        }
    }
}

const VEHICLE_COLUMNS: &str = "id, door_number, operator, facility_code, latitude, longitude, \
     speed, license_plate, recorded_at, last_updated, nearest_facility_code, \
     nearest_facility_name, distance_to_nearest_facility_km";

/// Returns every stored vehicle ordered by door number (missing last), then `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_vehicles(pool: &PgPool) -> Result<Vec<VehicleRow>, DbError> {
    let rows = sqlx::query_as::<_, VehicleRow>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles ORDER BY door_number NULLS LAST, id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches the vehicle with the given door number.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_vehicle_by_door_number(
    pool: &PgPool,
    door_number: &str,
) -> Result<Option<VehicleRow>, DbError> {
    let row = sqlx::query_as::<_, VehicleRow>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE door_number = $1 ORDER BY id LIMIT 1"
    ))
    .bind(door_number)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Replaces the whole `vehicles` table with `vehicles` in one transaction.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is then
/// rolled back and the previous rows are kept.
pub async fn replace_vehicles(pool: &PgPool, vehicles: &[Vehicle]) -> Result<u64, DbError> {
    let len = vehicles.len();
    let mut ids: Vec<i64> = Vec::with_capacity(len);
    let mut door_numbers: Vec<Option<String>> = Vec::with_capacity(len);
    let mut operators: Vec<Option<String>> = Vec::with_capacity(len);
    let mut facility_codes: Vec<Option<String>> = Vec::with_capacity(len);
    let mut latitudes: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut longitudes: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut speeds: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut plates: Vec<Option<String>> = Vec::with_capacity(len);
    let mut recorded: Vec<DateTime<Utc>> = Vec::with_capacity(len);
    let mut updated: Vec<DateTime<Utc>> = Vec::with_capacity(len);
    let mut nearest_codes: Vec<Option<String>> = Vec::with_capacity(len);
    let mut nearest_names: Vec<Option<String>> = Vec::with_capacity(len);
    let mut distances: Vec<Option<f64>> = Vec::with_capacity(len);

    for vehicle in vehicles {
        ids.push(vehicle.id);
        door_numbers.push(vehicle.door_number.clone());
        operators.push(vehicle.operator.clone());
        facility_codes.push(vehicle.facility_code.clone());
        latitudes.push(vehicle.latitude);
        longitudes.push(vehicle.longitude);
        speeds.push(vehicle.speed);
        plates.push(vehicle.license_plate.clone());
        recorded.push(vehicle.recorded_at);
        updated.push(vehicle.last_updated);
        nearest_codes.push(vehicle.nearest_facility_code.clone());
        nearest_names.push(vehicle.nearest_facility_name.clone());
        distances.push(vehicle.distance_to_nearest_facility_km);
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM vehicles")
        .execute(&mut *tx)
        .await?;

    let inserted = sqlx::query(&format!(
        "INSERT INTO vehicles ({VEHICLE_COLUMNS}) \
         SELECT * FROM UNNEST(\
              $1::int8[], $2::text[], $3::text[], $4::text[], \
              $5::float8[], $6::float8[], $7::float8[], $8::text[], \
              $9::timestamptz[], $10::timestamptz[], $11::text[], $12::text[], $13::float8[])"
    ))
    .bind(&ids)
    .bind(&door_numbers)
    .bind(&operators)
    .bind(&facility_codes)
    .bind(&latitudes)
    .bind(&longitudes)
    .bind(&speeds)
    .bind(&plates)
    .bind(&recorded)
    .bind(&updated)
    .bind(&nearest_codes)
    .bind(&nearest_names)
    .bind(&distances)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;

    tracing::debug!(rows = inserted, "replaced vehicles");
    Ok(inserted)
}
