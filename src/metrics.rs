//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in an ingest cycle.
//! Without an installed exporter the `metrics` facade drops everything, so
//! events are emitted unconditionally.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{AppError, Result};

/// Start a Prometheus endpoint on `0.0.0.0:<port>`.
///
/// Must be called from within the Tokio runtime.
pub fn init_exporter(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| AppError::config(format!("failed to start metrics exporter: {e}")))?;

    log::info!("Metrics server running on {addr}");
    Ok(())
}

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Records returned by the license source in one cycle.
pub struct RecordsFound {
    pub count: u64,
}

impl InternalEvent for RecordsFound {
    fn emit(self) {
        counter!("herald_records_found_total").increment(self.count);
    }
}

/// A record was filtered out before publishing.
pub struct RecordSkipped;

impl InternalEvent for RecordSkipped {
    fn emit(self) {
        counter!("herald_records_skipped_total").increment(1);
    }
}

/// A post was accepted.
pub struct PostSucceeded {
    pub attempts: u32,
}

impl InternalEvent for PostSucceeded {
    fn emit(self) {
        counter!("herald_posts_succeeded_total").increment(1);
        histogram!("herald_post_attempts").record(f64::from(self.attempts));
    }
}

/// A post exhausted its retry budget.
pub struct PostFailed;

impl InternalEvent for PostFailed {
    fn emit(self) {
        counter!("herald_posts_failed_total").increment(1);
    }
}

/// A cycle ran to completion.
pub struct CycleCompleted {
    pub duration: Duration,
}

impl InternalEvent for CycleCompleted {
    fn emit(self) {
        histogram!("herald_cycle_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// A cycle ended early: fetch failure, error, or panic.
pub struct CycleFailed {
    pub stage: &'static str,
}

impl InternalEvent for CycleFailed {
    fn emit(self) {
        counter!("herald_cycle_failures_total", "stage" => self.stage).increment(1);
    }
}
