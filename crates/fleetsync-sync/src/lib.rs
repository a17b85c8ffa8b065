//! Freshness-gated synchronization of the upstream transit datasets.
//!
//! [`TrackingService`] is the entry point: it consults the retrieval audit log,
//! serves the stored dataset while it is fresh, and otherwise runs one
//! synchronization pass per kind (fetch, decode, normalize, enrich, replace,
//! audit) under a per-kind single-flight guard.

pub mod enrich;
pub mod error;
pub mod facility;
pub mod freshness;
pub mod memory;
pub mod normalize;
pub mod pass;
pub mod pg;
pub mod service;
pub mod store;
pub mod vehicle;

pub use enrich::{enrich_vehicles, nearest_facility, NearestFacility};
pub use error::{StoreError, SyncError};
pub use facility::FacilitySynchronizer;
pub use freshness::{is_stale, is_stale_at};
pub use memory::MemoryStore;
pub use normalize::{
    normalize_facilities, normalize_vehicles, vehicle_identity, FieldReport, VehicleIdentity,
};
pub use pass::{PassStatus, SyncOutcome, ZERO_RECORDS_REASON};
pub use pg::PgStore;
pub use service::{Dataset, RefreshOutcome, TrackingService};
pub use store::{DatasetStore, RetrievalAudit};
pub use vehicle::VehicleSynchronizer;
