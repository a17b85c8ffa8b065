//! Decides whether a stored dataset must be refreshed from upstream.

use chrono::{DateTime, Duration, Utc};
use fleetsync_core::DataKind;

use crate::store::RetrievalAudit;

/// Whether `kind` lacks a succeeded retrieval within the last
/// `window_minutes`, measured from now.
pub async fn is_stale(audit: &dyn RetrievalAudit, kind: DataKind, window_minutes: u32) -> bool {
    is_stale_at(audit, kind, window_minutes, Utc::now()).await
}

/// Like [`is_stale`], with an explicit reference time.
///
/// An audit read failure counts as stale so the caller attempts a refresh
/// rather than serving data of unknown age.
pub async fn is_stale_at(
    audit: &dyn RetrievalAudit,
    kind: DataKind,
    window_minutes: u32,
    now: DateTime<Utc>,
) -> bool {
    let threshold = now - Duration::minutes(i64::from(window_minutes));
    match audit.exists_success_since(kind, threshold).await {
        Ok(fresh) => !fresh,
        Err(e) => {
            tracing::warn!(kind = %kind, error = %e, "retrieval audit unreadable; treating as stale");
            true
        }
    }
}
