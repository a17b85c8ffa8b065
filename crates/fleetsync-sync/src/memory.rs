//! In-process [`DatasetStore`] and [`RetrievalAudit`].
//!
//! Mirrors the Postgres ordering rules so callers observe the same snapshot
//! order from either backend. Writes can be made to fail on demand, which is
//! how the replace-failure path is exercised in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetsync_core::{DataKind, Facility, RetrievalRecord, Vehicle};

use crate::error::StoreError;
use crate::store::{DatasetStore, RetrievalAudit};

#[derive(Debug, Default)]
struct Tables {
    facilities: Vec<Facility>,
    vehicles: Vec<Vehicle>,
    retrievals: Vec<RetrievalRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, `replace_*` calls fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Appends an audit entry with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store lock is poisoned.
    pub fn record_attempt_at(
        &self,
        kind: DataKind,
        attempted_at: DateTime<Utc>,
        succeeded: bool,
        error_message: Option<&str>,
    ) -> Result<RetrievalRecord, StoreError> {
        let mut tables = self.lock()?;
        let record = RetrievalRecord {
            id: i64::try_from(tables.retrievals.len()).unwrap_or(i64::MAX - 1) + 1,
            kind,
            attempted_at,
            succeeded,
            error_message: error_message.map(str::to_string),
        };
        tables.retrievals.push(record.clone());
        Ok(record)
    }

    /// Every audit entry in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store lock is poisoned.
    pub fn retrievals(&self) -> Result<Vec<RetrievalRecord>, StoreError> {
        Ok(self.lock()?.retrievals.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store writes disabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn find_all_facilities(&self) -> Result<Vec<Facility>, StoreError> {
        let mut facilities = self.lock()?.facilities.clone();
        facilities.sort_by_key(|f| f.id);
        Ok(facilities)
    }

    async fn replace_facilities(&self, facilities: &[Facility]) -> Result<u64, StoreError> {
        self.check_writable()?;
        self.lock()?.facilities = facilities.to_vec();
        Ok(facilities.len() as u64)
    }

    async fn find_facility_by_code(&self, code: &str) -> Result<Option<Facility>, StoreError> {
        Ok(self
            .lock()?
            .facilities
            .iter()
            .filter(|f| f.code == code)
            .min_by_key(|f| f.id)
            .cloned())
    }

    async fn find_all_vehicles(&self) -> Result<Vec<Vehicle>, StoreError> {
        let mut vehicles = self.lock()?.vehicles.clone();
        vehicles.sort_by(|a, b| {
            (a.door_number.is_none(), &a.door_number, a.id).cmp(&(
                b.door_number.is_none(),
                &b.door_number,
                b.id,
            ))
        });
        Ok(vehicles)
    }

    async fn replace_vehicles(&self, vehicles: &[Vehicle]) -> Result<u64, StoreError> {
        self.check_writable()?;
        self.lock()?.vehicles = vehicles.to_vec();
        Ok(vehicles.len() as u64)
    }

    async fn find_vehicle_by_door_number(
        &self,
        door_number: &str,
    ) -> Result<Option<Vehicle>, StoreError> {
        Ok(self
            .lock()?
            .vehicles
            .iter()
            .filter(|v| v.door_number.as_deref() == Some(door_number))
            .min_by_key(|v| v.id)
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl RetrievalAudit for MemoryStore {
    async fn append(
        &self,
        kind: DataKind,
        succeeded: bool,
        error_message: Option<&str>,
    ) -> Result<RetrievalRecord, StoreError> {
        self.record_attempt_at(kind, Utc::now(), succeeded, error_message)
    }

    async fn exists_success_since(
        &self,
        kind: DataKind,
        threshold: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .retrievals
            .iter()
            .any(|r| r.kind == kind && r.succeeded && r.attempted_at > threshold))
    }

    async fn latest(&self, kind: DataKind) -> Result<Option<RetrievalRecord>, StoreError> {
        Ok(self
            .lock()?
            .retrievals
            .iter()
            .filter(|r| r.kind == kind)
            .max_by_key(|r| (r.attempted_at, r.id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(id: i64, code: &str) -> Facility {
        Facility {
            id,
            name: code.to_string(),
            code: code.to_string(),
            coordinate: None,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn facilities_come_back_sorted_by_id() {
        let store = MemoryStore::new();
        store
            .replace_facilities(&[facility(3, "C"), facility(1, "A")])
            .await
            .unwrap();

        let ids: Vec<i64> = store
            .find_all_facilities()
            .await
            .unwrap()
            .iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn failing_writes_keep_previous_rows() {
        let store = MemoryStore::new();
        store.replace_facilities(&[facility(1, "A")]).await.unwrap();
        store.set_fail_writes(true);

        assert!(store.replace_facilities(&[]).await.is_err());
        assert_eq!(store.find_all_facilities().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn latest_prefers_newest_attempt() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .record_attempt_at(DataKind::Vehicle, now, false, Some("boom"))
            .unwrap();
        store
            .record_attempt_at(DataKind::Vehicle, now - chrono::Duration::minutes(1), true, None)
            .unwrap();

        let latest = store.latest(DataKind::Vehicle).await.unwrap().unwrap();
        assert!(!latest.succeeded);
        assert!(store.latest(DataKind::Facility).await.unwrap().is_none());
    }
}
