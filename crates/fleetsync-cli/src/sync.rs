//! `sync` command: run the freshness-gated read, or a forced pass, for one
//! dataset kind and report what happened.

use fleetsync_core::DataKind;
use fleetsync_sync::{PassStatus, TrackingService};

pub(crate) async fn run_sync(
    service: &TrackingService,
    kind: DataKind,
    force: bool,
) -> anyhow::Result<()> {
    if force {
        let outcome = service.refresh(kind).await?;
        println!(
            "{kind}: {} ({} records served)",
            describe_status(&outcome.status),
            outcome.dataset.len()
        );
        return Ok(());
    }

    let dataset = service.get_current_data(kind).await?;
    let latest = service.latest_retrieval(kind).await?;
    let last = latest.map_or_else(
        || "no attempts recorded".to_string(),
        |r| {
            format!(
                "last attempt {} at {}",
                if r.succeeded { "succeeded" } else { "failed" },
                r.attempted_at.to_rfc3339()
            )
        },
    );
    println!("{kind}: {} records served; {last}", dataset.len());
    Ok(())
}

pub(crate) fn describe_status(status: &PassStatus) -> String {
    match status {
        PassStatus::Refreshed { stored, report } => {
            if report.has_defaults() {
                format!(
                    "refreshed {stored} records (defaulted: {} timestamps, {} speeds, {} coordinates; {} synthesized ids)",
                    report.defaulted_timestamps,
                    report.defaulted_speeds,
                    report.missing_coordinates + report.partial_coordinates + report.unparsed_geometries,
                    report.synthesized_identities
                )
            } else {
                format!("refreshed {stored} records")
            }
        }
        PassStatus::FailedOpen { reason } => format!("refresh failed, kept stored data: {reason}"),
    }
}
