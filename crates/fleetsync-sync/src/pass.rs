//! Result types shared by the facility and vehicle synchronizers.

use fleetsync_core::DataKind;
use serde::Serialize;

use crate::normalize::FieldReport;
use crate::store::RetrievalAudit;

/// Audit message recorded when the upstream answered with no records.
pub const ZERO_RECORDS_REASON: &str = "decoded zero records";

/// How a synchronization pass ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassStatus {
    /// The stored dataset was replaced with `stored` fresh records.
    Refreshed { stored: u64, report: FieldReport },
    /// Fetch, decode, or replace failed; the previous dataset was kept.
    FailedOpen { reason: String },
}

impl PassStatus {
    #[must_use]
    pub fn is_refreshed(&self) -> bool {
        matches!(self, PassStatus::Refreshed { .. })
    }
}

/// The dataset served after a pass, together with how the pass went.
#[derive(Debug, Clone)]
pub struct SyncOutcome<T> {
    pub records: Vec<T>,
    pub status: PassStatus,
}

/// Appends an audit entry; failures are logged and never propagated.
pub(crate) async fn record_attempt(
    audit: &dyn RetrievalAudit,
    kind: DataKind,
    succeeded: bool,
    error_message: Option<&str>,
) {
    if let Err(e) = audit.append(kind, succeeded, error_message).await {
        tracing::error!(
            kind = %kind,
            succeeded,
            error = %e,
            "failed to record retrieval attempt"
        );
    }
}
