//! Postgres-backed [`DatasetStore`] and [`RetrievalAudit`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetsync_core::{DataKind, Facility, RetrievalRecord, Vehicle};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::store::{DatasetStore, RetrievalAudit};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetStore for PgStore {
    async fn find_all_facilities(&self) -> Result<Vec<Facility>, StoreError> {
        let rows = fleetsync_db::list_facilities(&self.pool).await?;
        Ok(rows.into_iter().map(Facility::from).collect())
    }

    async fn replace_facilities(&self, facilities: &[Facility]) -> Result<u64, StoreError> {
        Ok(fleetsync_db::replace_facilities(&self.pool, facilities).await?)
    }

    async fn find_facility_by_code(&self, code: &str) -> Result<Option<Facility>, StoreError> {
        let row = fleetsync_db::get_facility_by_code(&self.pool, code).await?;
        Ok(row.map(Facility::from))
    }

    async fn find_all_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        let rows = fleetsync_db::list_vehicles(&self.pool).await?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    async fn replace_vehicles(&self, vehicles: &[Vehicle]) -> Result<u64, StoreError> {
        Ok(fleetsync_db::replace_vehicles(&self.pool, vehicles).await?)
    }

    async fn find_vehicle_by_door_number(
        &self,
        door_number: &str,
    ) -> Result<Option<Vehicle>, StoreError> {
        let row = fleetsync_db::get_vehicle_by_door_number(&self.pool, door_number).await?;
        Ok(row.map(Vehicle::from))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(fleetsync_db::health_check(&self.pool).await?)
    }
}

#[async_trait]
impl RetrievalAudit for PgStore {
    async fn append(
        &self,
        kind: DataKind,
        succeeded: bool,
        error_message: Option<&str>,
    ) -> Result<RetrievalRecord, StoreError> {
        let row =
            fleetsync_db::insert_retrieval_log(&self.pool, kind, Utc::now(), succeeded, error_message)
                .await?;
        Ok(RetrievalRecord::try_from(row)?)
    }

    async fn exists_success_since(
        &self,
        kind: DataKind,
        threshold: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(fleetsync_db::exists_successful_retrieval_since(&self.pool, kind, threshold).await?)
    }

    async fn latest(&self, kind: DataKind) -> Result<Option<RetrievalRecord>, StoreError> {
        let row = fleetsync_db::get_latest_retrieval(&self.pool, kind).await?;
        Ok(row.map(RetrievalRecord::try_from).transpose()?)
    }
}
