//! Collaborator traits for the persistence layer.
//!
//! The synchronizers and [`crate::TrackingService`] only depend on these
//! traits. [`crate::PgStore`] backs them with Postgres; [`crate::MemoryStore`]
//! keeps everything in process for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetsync_core::{DataKind, Facility, RetrievalRecord, Vehicle};

use crate::error::StoreError;

/// Mirrored datasets, replaced wholesale by synchronization passes.
#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// All facilities ordered by `id`.
    async fn find_all_facilities(&self) -> Result<Vec<Facility>, StoreError>;

    /// Deletes every facility and inserts `facilities` as one unit.
    async fn replace_facilities(&self, facilities: &[Facility]) -> Result<u64, StoreError>;

    async fn find_facility_by_code(&self, code: &str) -> Result<Option<Facility>, StoreError>;

    /// All vehicles ordered by door number, missing door numbers last.
    async fn find_all_vehicles(&self) -> Result<Vec<Vehicle>, StoreError>;

    /// Deletes every vehicle and inserts `vehicles` as one unit.
    async fn replace_vehicles(&self, vehicles: &[Vehicle]) -> Result<u64, StoreError>;

    async fn find_vehicle_by_door_number(
        &self,
        door_number: &str,
    ) -> Result<Option<Vehicle>, StoreError>;

    /// Cheap liveness probe used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Append-only log of retrieval attempts.
#[async_trait]
pub trait RetrievalAudit: Send + Sync {
    /// Records one attempt stamped with the current time.
    async fn append(
        &self,
        kind: DataKind,
        succeeded: bool,
        error_message: Option<&str>,
    ) -> Result<RetrievalRecord, StoreError>;

    /// Whether a succeeded attempt for `kind` exists strictly after `threshold`.
    async fn exists_success_since(
        &self,
        kind: DataKind,
        threshold: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Most recent attempt for `kind`, successful or not.
    async fn latest(&self, kind: DataKind) -> Result<Option<RetrievalRecord>, StoreError>;
}
