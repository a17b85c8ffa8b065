//! `status` command: freshness and recent retrieval attempts per dataset.

use chrono::{DateTime, Utc};
use fleetsync_core::{AppConfig, DataKind, RetrievalRecord};
use fleetsync_sync::{is_stale_at, PgStore};
use sqlx::PgPool;

pub(crate) async fn run_status(pool: &PgPool, config: &AppConfig, limit: i64) -> anyhow::Result<()> {
    let audit = PgStore::new(pool.clone());
    let now = Utc::now();

    for kind in DataKind::ALL {
        let stale = is_stale_at(&audit, kind, config.cache_window_minutes, now).await;
        let latest = fleetsync_db::get_latest_retrieval(pool, kind)
            .await?
            .map(RetrievalRecord::try_from)
            .transpose()?;
        println!(
            "{kind}: {} (window {} min); {}",
            if stale { "stale" } else { "fresh" },
            config.cache_window_minutes,
            latest.as_ref().map_or_else(
                || "never attempted".to_string(),
                |r| format!("latest {}", format_record(r, now))
            )
        );
    }

    let recent = fleetsync_db::list_recent_retrievals(pool, limit.max(1)).await?;
    if recent.is_empty() {
        return Ok(());
    }
    println!("recent attempts:");
    for row in recent {
        let record = RetrievalRecord::try_from(row)?;
        println!("  {}", format_record(&record, now));
    }
    Ok(())
}

pub(crate) fn format_record(record: &RetrievalRecord, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(record.attempted_at).num_seconds().max(0);
    let mut line = format!(
        "#{} {} {} {} ({age}s ago)",
        record.id,
        record.kind,
        if record.succeeded { "ok" } else { "FAILED" },
        record.attempted_at.to_rfc3339(),
    );
    if let Some(message) = &record.error_message {
        line.push_str(": ");
        line.push_str(message);
    }
    line
}
