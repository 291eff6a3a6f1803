//! Observability infrastructure for dacl.
//!
//! This module provides:
//! - Structured logging configuration
//! - Metric descriptions and recording helpers

mod logging;
mod metrics;

pub use logging::{create_json_layer, init_logging, LoggingConfig};
pub use self::metrics::{
    record_cache_hit, record_cache_miss, record_decision, record_sync_run, register_metrics,
};
