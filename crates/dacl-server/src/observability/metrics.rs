//! Metric descriptions and recording helpers.
//!
//! Metrics go through the `metrics` facade; the embedding application
//! installs whichever recorder it exports with. Without a recorder every
//! call here is a no-op.
//!
//! # Metrics Exposed
//!
//! - `dacl_authz_decisions_total` - Decisions by outcome
//! - `dacl_authz_cache_hits_total` - Decision cache hits
//! - `dacl_authz_cache_misses_total` - Decision cache misses
//! - `dacl_sync_runs_total` - Synchronizer runs by outcome
//! - `dacl_sync_duration_seconds` - Synchronizer run duration histogram

use dacl_domain::Decision;

/// Describes every metric recorded by this crate.
///
/// Call once after installing a recorder.
pub fn register_metrics() {
    metrics::describe_counter!(
        "dacl_authz_decisions_total",
        "Total number of authorization decisions by outcome"
    );
    metrics::describe_counter!(
        "dacl_authz_cache_hits_total",
        "Total number of authorization cache hits"
    );
    metrics::describe_counter!(
        "dacl_authz_cache_misses_total",
        "Total number of authorization cache misses"
    );
    metrics::describe_counter!(
        "dacl_sync_runs_total",
        "Total number of directory synchronizer runs by outcome"
    );
    metrics::describe_histogram!(
        "dacl_sync_duration_seconds",
        "Directory synchronizer run duration in seconds"
    );
}

/// Records one authorization decision.
pub fn record_decision(decision: Decision) {
    metrics::counter!("dacl_authz_decisions_total", "decision" => decision.as_str()).increment(1);
}

pub fn record_cache_hit() {
    metrics::counter!("dacl_authz_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    metrics::counter!("dacl_authz_cache_misses_total").increment(1);
}

/// Records a synchronizer run.
///
/// `outcome` is one of "completed", "skipped" or "failed".
pub fn record_sync_run(outcome: &'static str, duration_seconds: f64) {
    metrics::counter!("dacl_sync_runs_total", "outcome" => outcome).increment(1);
    if outcome != "skipped" {
        metrics::histogram!("dacl_sync_duration_seconds").record(duration_seconds);
    }
}
