//! One synchronization pass for the facility dataset.

use std::sync::Arc;

use chrono::Utc;
use fleetsync_core::{DataKind, Facility};
use fleetsync_soap::{SoapClient, SoapEndpoint};

use crate::error::SyncError;
use crate::normalize::normalize_facilities;
use crate::pass::{record_attempt, PassStatus, SyncOutcome, ZERO_RECORDS_REASON};
use crate::store::{DatasetStore, RetrievalAudit};

const KIND: DataKind = DataKind::Facility;

pub struct FacilitySynchronizer {
    client: SoapClient,
    endpoint: SoapEndpoint,
    store: Arc<dyn DatasetStore>,
    audit: Arc<dyn RetrievalAudit>,
}

impl FacilitySynchronizer {
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
        }
    }

    /// Fetches, maps, and republishes the facility dataset.
    ///
    /// No retries are attempted. Any upstream, decode, or write failure is
    /// audited and the previously stored facilities are returned.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Read`] only when the stored dataset cannot be read
    /// back.
    pub async fn run_pass(&self) -> Result<SyncOutcome<Facility>, SyncError> {
        tracing::info!(kind = %KIND, url = %self.endpoint.url, "fetching facilities from upstream");

        let records = match self.client.fetch_records(&self.endpoint).await {
            Ok(records) if records.is_empty() => {
                return self.fail_open(ZERO_RECORDS_REASON.to_string()).await;
            }
            Ok(records) => records,
            Err(e) => return self.fail_open(e.to_string()).await,
        };

        let (facilities, report) = normalize_facilities(&records, Utc::now());
        report.emit(KIND);

        let stored = match self.store.replace_facilities(&facilities).await {
            Ok(stored) => stored,
            Err(e) => return self.fail_open(format!("failed to store facilities: {e}")).await,
        };

        record_attempt(self.audit.as_ref(), KIND, true, None).await;
        tracing::info!(kind = %KIND, stored, "facility dataset refreshed");

        let records = self
            .store
            .find_all_facilities()
            .await
            .map_err(SyncError::read(KIND))?;
        Ok(SyncOutcome {
            records,
            status: PassStatus::Refreshed { stored, report },
        })
    }

    async fn fail_open(&self, reason: String) -> Result<SyncOutcome<Facility>, SyncError> {
        tracing::warn!(kind = %KIND, reason = %reason, "facility refresh failed; serving stored data");
        record_attempt(self.audit.as_ref(), KIND, false, Some(&reason)).await;

        let records = self
            .store
            .find_all_facilities()
            .await
            .map_err(SyncError::read(KIND))?;
        Ok(SyncOutcome {
            records,
            status: PassStatus::FailedOpen { reason },
        })
    }
}
