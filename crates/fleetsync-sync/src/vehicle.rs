//! One synchronization pass for the vehicle dataset.

use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use fleetsync_core::{DataKind, Facility, Vehicle};
use fleetsync_soap::{SoapClient, SoapEndpoint};

use crate::enrich::enrich_vehicles;
use crate::error::SyncError;
use crate::normalize::normalize_vehicles;
use crate::pass::{record_attempt, PassStatus, SyncOutcome, ZERO_RECORDS_REASON};
use crate::store::{DatasetStore, RetrievalAudit};

const KIND: DataKind = DataKind::Vehicle;

pub struct VehicleSynchronizer {
    client: SoapClient,
    endpoint: SoapEndpoint,
    store: Arc<dyn DatasetStore>,
    audit: Arc<dyn RetrievalAudit>,
    source_offset: FixedOffset,
}

impl VehicleSynchronizer {
    #[must_use]
    pub fn new(
        client: SoapClient,
        endpoint: SoapEndpoint,
        store: Arc<dyn DatasetStore>,
        audit: Arc<dyn RetrievalAudit>,
    ) -> Self {
        Self {
            client,
            endpoint,
            store,
            audit,
            source_offset: Utc.fix(),
        }
    }

    /// Sets the offset of the upstream clock. Defaults to UTC.
    #[must_use]
    pub fn with_source_offset(mut self, source_offset: FixedOffset) -> Self {
        self.source_offset = source_offset;
        self
    }

    /// Fetches, maps, enriches against `facilities`, and republishes the
    /// vehicle dataset.
    ///
    /// `facilities` is the snapshot taken once at the start of the pass.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Read`] only when the stored dataset cannot be read
    /// back.
    pub async fn run_pass(&self, facilities: &[Facility]) -> Result<SyncOutcome<Vehicle>, SyncError> {
        tracing::info!(kind = %KIND, url = %self.endpoint.url, "fetching vehicles from upstream");

        let records = match self.client.fetch_records(&self.endpoint).await {
            Ok(records) if records.is_empty() => {
                return self.fail_open(ZERO_RECORDS_REASON.to_string()).await;
            }
            Ok(records) => records,
            Err(e) => return self.fail_open(e.to_string()).await,
        };

        let (mut vehicles, report) = normalize_vehicles(&records, Utc::now(), self.source_offset);
        report.emit(KIND);

        let enriched = enrich_vehicles(&mut vehicles, facilities);
        tracing::debug!(
            kind = %KIND,
            vehicles = vehicles.len(),
            facilities = facilities.len(),
            enriched,
            "enriched vehicles with nearest facility"
        );

        let stored = match self.store.replace_vehicles(&vehicles).await {
            Ok(stored) => stored,
            Err(e) => return self.fail_open(format!("failed to store vehicles: {e}")).await,
        };

        record_attempt(self.audit.as_ref(), KIND, true, None).await;
        tracing::info!(kind = %KIND, stored, "vehicle dataset refreshed");

        let records = self
            .store
            .find_all_vehicles()
            .await
            .map_err(SyncError::read(KIND))?;
        Ok(SyncOutcome {
            records,
            status: PassStatus::Refreshed { stored, report },
        })
    }

    async fn fail_open(&self, reason: String) -> Result<SyncOutcome<Vehicle>, SyncError> {
        tracing::warn!(kind = %KIND, reason = %reason, "vehicle refresh failed; serving stored data");
        record_attempt(self.audit.as_ref(), KIND, false, Some(&reason)).await;

        let records = self
            .store
            .find_all_vehicles()
            .await
            .map_err(SyncError::read(KIND))?;
        Ok(SyncOutcome {
            records,
            status: PassStatus::FailedOpen { reason },
        })
    }
}
