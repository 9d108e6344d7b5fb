//! Metrics for observability.
//!
//! Exports metrics through the `metrics` facade; the exporter (if any)
//! is wired up by the host environment.
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replication_` and follow Prometheus
//! conventions: counters end in `_total`, histograms track durations in
//! seconds.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record one completed source snapshot fetch.
pub fn record_snapshot_fetch(collections: usize, entries: usize, duration: Duration) {
    counter!("replication_snapshot_collections").absolute(collections as u64);
    counter!("replication_snapshot_entries").absolute(entries as u64);
    histogram!("replication_snapshot_fetch_duration_seconds").record(duration.as_secs_f64());
}

/// Record a tunnel open attempt.
pub fn record_tunnel_open(recipient: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("replication_tunnel_opens_total", "recipient" => recipient.to_string(), "status" => status).increment(1);
}

/// Record entries written to a recipient (partial counts included).
pub fn record_entries_copied(recipient: &str, count: usize) {
    counter!("replication_entries_copied_total", "recipient" => recipient.to_string())
        .increment(count as u64);
}

/// Record the terminal outcome of one recipient task.
pub fn record_recipient_result(recipient: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("replication_recipient_runs_total", "recipient" => recipient.to_string(), "status" => status).increment(1);
}

/// Record a failure report delivery attempt.
pub fn record_notification(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("replication_notifications_total", "status" => status).increment(1);
}
