//! Freshness-gated access to the mirrored datasets.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use fleetsync_core::{AppConfig, DataKind, Facility, RetrievalRecord, Vehicle};
use fleetsync_soap::{SoapClient, SoapEndpoint};
use tokio::sync::Mutex;

use crate::error::SyncError;
use crate::facility::FacilitySynchronizer;
use crate::freshness::is_stale;
use crate::pass::{PassStatus, SyncOutcome};
use crate::store::{DatasetStore, RetrievalAudit};
use crate::vehicle::VehicleSynchronizer;

/// A full snapshot of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Facilities(Vec<Facility>),
    Vehicles(Vec<Vehicle>),
}

impl Dataset {
    #[must_use]
    pub fn kind(&self) -> DataKind {
        match self {
            Dataset::Facilities(_) => DataKind::Facility,
            Dataset::Vehicles(_) => DataKind::Vehicle,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Dataset::Facilities(items) => items.len(),
            Dataset::Vehicles(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of a forced refresh.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub dataset: Dataset,
    pub status: PassStatus,
}

/// Serves the stored datasets, refreshing them from upstream when the
/// retrieval audit shows no success within the cache window.
///
/// At most one pass per kind runs at a time. Callers that queued behind a
/// running pass reuse its result instead of fetching again.
pub struct TrackingService {
    store: Arc<dyn DatasetStore>,
    audit: Arc<dyn RetrievalAudit>,
    facility_sync: FacilitySynchronizer,
    vehicle_sync: VehicleSynchronizer,
    window_minutes: u32,
    facility_guard: Mutex<()>,
    vehicle_guard: Mutex<()>,
}

impl TrackingService {
    #[must_use]
    pub fn new(
        client: SoapClient,
        facility_endpoint: SoapEndpoint,
        vehicle_endpoint: SoapEndpoint,
        store: Arc<dyn DatasetStore>,
        audit: Arc<dyn RetrievalAudit>,
        window_minutes: u32,
    ) -> Self {
        Self {
            facility_sync: FacilitySynchronizer::new(
                client.clone(),
                facility_endpoint,
                Arc::clone(&store),
                Arc::clone(&audit),
            ),
            vehicle_sync: VehicleSynchronizer::new(
                client,
                vehicle_endpoint,
                Arc::clone(&store),
                Arc::clone(&audit),
            ),
            store,
            audit,
            window_minutes,
            facility_guard: Mutex::new(()),
            vehicle_guard: Mutex::new(()),
        }
    }

    /// Builds the service from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Client`] if the HTTP client cannot be constructed.
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn DatasetStore>,
        audit: Arc<dyn RetrievalAudit>,
    ) -> Result<Self, SyncError> {
        let client = SoapClient::new(
            config.soap_timeout_secs,
            &config.user_agent,
            &config.soap_namespace,
        )?;
        let endpoint = |kind: DataKind| {
            let service = config.service_for(kind);
            SoapEndpoint::new(service.url.clone(), service.method.clone())
        };
        Ok(Self::new(
            client,
            endpoint(DataKind::Facility),
            endpoint(DataKind::Vehicle),
            store,
            audit,
            config.cache_window_minutes,
        )
        .with_source_offset(config.source_utc_offset))
    }

    /// Sets the offset of the upstream vehicle clock. Defaults to UTC.
    #[must_use]
    pub fn with_source_offset(mut self, source_offset: FixedOffset) -> Self {
        self.vehicle_sync = self.vehicle_sync.with_source_offset(source_offset);
        self
    }

    /// Current dataset for `kind`, refreshed first if stale.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] only when the stored dataset cannot be read.
    pub async fn get_current_data(&self, kind: DataKind) -> Result<Dataset, SyncError> {
        match kind {
            DataKind::Facility => Ok(Dataset::Facilities(self.current_facilities().await?)),
            DataKind::Vehicle => Ok(Dataset::Vehicles(self.current_vehicles().await?)),
        }
    }

    /// # Errors
    ///
    /// Returns [`SyncError`] only when the stored dataset cannot be read.
    pub async fn current_facilities(&self) -> Result<Vec<Facility>, SyncError> {
        let checked_at = Utc::now();
        if !is_stale(self.audit.as_ref(), DataKind::Facility, self.window_minutes).await {
            tracing::debug!(kind = %DataKind::Facility, "serving cached dataset");
            return self.stored_facilities().await;
        }

        let _guard = self.facility_guard.lock().await;
        if self.attempted_since(DataKind::Facility, checked_at).await {
            return self.stored_facilities().await;
        }
        Ok(self.facility_sync.run_pass().await?.records)
    }

    /// # Errors
    ///
    /// Returns [`SyncError`] only when a stored dataset cannot be read.
    pub async fn current_vehicles(&self) -> Result<Vec<Vehicle>, SyncError> {
        match self.refresh_vehicles_if_stale().await? {
            Some(outcome) => Ok(outcome.records),
            None => self.stored_vehicles().await,
        }
    }

    /// Runs a pass for `kind` regardless of freshness. Still waits for any
    /// pass of the same kind that is already running.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] only when a stored dataset cannot be read.
    pub async fn refresh(&self, kind: DataKind) -> Result<RefreshOutcome, SyncError> {
        match kind {
            DataKind::Facility => {
                let outcome = self.refresh_facilities().await?;
                Ok(RefreshOutcome {
                    dataset: Dataset::Facilities(outcome.records),
                    status: outcome.status,
                })
            }
            DataKind::Vehicle => {
                let outcome = self.refresh_vehicles().await?;
                Ok(RefreshOutcome {
                    dataset: Dataset::Vehicles(outcome.records),
                    status: outcome.status,
                })
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`SyncError`] only when the stored dataset cannot be read.
    pub async fn refresh_facilities(&self) -> Result<SyncOutcome<Facility>, SyncError> {
        tracing::info!(kind = %DataKind::Facility, "forced refresh requested");
        let _guard = self.facility_guard.lock().await;
        self.facility_sync.run_pass().await
    }

    /// # Errors
    ///
    /// Returns [`SyncError`] only when a stored dataset cannot be read.
    pub async fn refresh_vehicles(&self) -> Result<SyncOutcome<Vehicle>, SyncError> {
        tracing::info!(kind = %DataKind::Vehicle, "forced refresh requested");
        let _guard = self.vehicle_guard.lock().await;
        self.vehicle_pass().await
    }

    /// Looks up a stored facility without triggering a refresh.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Read`] if the store query fails.
    pub async fn find_facility_by_code(&self, code: &str) -> Result<Option<Facility>, SyncError> {
        self.store
            .find_facility_by_code(code)
            .await
            .map_err(SyncError::read(DataKind::Facility))
    }

    /// Looks up a vehicle, refreshing the vehicle dataset first if stale.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if a stored dataset cannot be read.
    pub async fn find_vehicle_by_door_number(
        &self,
        door_number: &str,
    ) -> Result<Option<Vehicle>, SyncError> {
        self.refresh_vehicles_if_stale().await?;
        self.store
            .find_vehicle_by_door_number(door_number)
            .await
            .map_err(SyncError::read(DataKind::Vehicle))
    }

    /// Most recent retrieval attempt for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the audit log cannot be read.
    pub async fn latest_retrieval(
        &self,
        kind: DataKind,
    ) -> Result<Option<RetrievalRecord>, SyncError> {
        Ok(self.audit.latest(kind).await?)
    }

    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the store does not answer.
    pub async fn ping(&self) -> Result<(), SyncError> {
        Ok(self.store.ping().await?)
    }

    /// Runs a vehicle pass when the dataset is stale and no other caller
    /// refreshed it while this one waited. `None` means the stored dataset
    /// is current.
    async fn refresh_vehicles_if_stale(&self) -> Result<Option<SyncOutcome<Vehicle>>, SyncError> {
        let checked_at = Utc::now();
        if !is_stale(self.audit.as_ref(), DataKind::Vehicle, self.window_minutes).await {
            tracing::debug!(kind = %DataKind::Vehicle, "serving cached dataset");
            return Ok(None);
        }

        let _guard = self.vehicle_guard.lock().await;
        if self.attempted_since(DataKind::Vehicle, checked_at).await {
            return Ok(None);
        }
        Ok(Some(self.vehicle_pass().await?))
    }

    /// Vehicle pass against a facility snapshot taken through the gated
    /// facility path. Callers must hold `vehicle_guard`.
    async fn vehicle_pass(&self) -> Result<SyncOutcome<Vehicle>, SyncError> {
        let facilities = self.current_facilities().await?;
        self.vehicle_sync.run_pass(&facilities).await
    }

    /// Whether a pass for `kind` was recorded at or after `since`, meaning
    /// another caller refreshed while this one waited for the guard.
    async fn attempted_since(&self, kind: DataKind, since: DateTime<Utc>) -> bool {
        match self.audit.latest(kind).await {
            Ok(Some(record)) if record.attempted_at >= since => {
                tracing::debug!(kind = %kind, "pass completed while waiting; reusing its result");
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "retrieval audit unreadable");
                false
            }
        }
    }

    async fn stored_facilities(&self) -> Result<Vec<Facility>, SyncError> {
        self.store
            .find_all_facilities()
            .await
            .map_err(SyncError::read(DataKind::Facility))
    }

    async fn stored_vehicles(&self) -> Result<Vec<Vehicle>, SyncError> {
        self.store
            .find_all_vehicles()
            .await
            .map_err(SyncError::read(DataKind::Vehicle))
    }
}
