use fleetsync_core::DataKind;
use thiserror::Error;

/// Failures of a [`crate::DatasetStore`] or [`crate::RetrievalAudit`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] fleetsync_db::DbError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to callers of [`crate::TrackingService`].
///
/// Upstream and write failures are absorbed into the fail-open path; only an
/// inability to read the stored dataset reaches the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to read stored {kind} dataset: {source}")]
    Read {
        kind: DataKind,
        #[source]
        source: StoreError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("SOAP client setup failed: {0}")]
    Client(#[from] fleetsync_soap::SoapError),
}

impl SyncError {
    pub(crate) fn read(kind: DataKind) -> impl FnOnce(StoreError) -> Self {
        move |source| SyncError::Read { kind, source }
    }
}
