//! Prometheus metrics for the point-of-sale runtime.
//!
//! Metrics are recorded through the `metrics` facade, so recording is a no-op
//! until a recorder is installed. The server installs the Prometheus exporter
//! through [`MetricsExporter`] and renders it on `/metrics`.
//!
//! # Example
//!
//! ```rust,no_run
//! use kasir_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//! let body = exporter.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus exporter handle.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a warning
    /// and leaves the exporter without a handle.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the exporter hasn't been installed.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Commit pipeline
    describe_counter!(
        "kasir_transactions_committed_total",
        "Total number of transactions committed"
    );
    describe_counter!(
        "kasir_transactions_failed_total",
        "Total number of commits that failed, labelled by failing step"
    );
    describe_histogram!(
        "kasir_commit_duration_seconds",
        "Time spent inside the commit pipeline"
    );
    describe_counter!(
        "kasir_custom_items_materialized_total",
        "Custom cart items turned into catalog products"
    );
    describe_counter!(
        "kasir_stock_decrements_total",
        "Stock decrements applied to tracked products"
    );

    // Request serializer
    describe_histogram!(
        "kasir_lock_wait_duration_seconds",
        "Time spent waiting for the request lock"
    );
    describe_counter!(
        "kasir_lock_timeouts_total",
        "Requests rejected because the lock was not acquired in time"
    );

    // Other writers
    describe_counter!("kasir_cash_notes_total", "Cash notes recorded");
    describe_counter!(
        "kasir_requests_total",
        "Envelope requests handled, labelled by action and status"
    );
}

/// Request serializer metrics recorder.
pub struct SerializerMetrics;

impl SerializerMetrics {
    /// Record how long a request waited for the lock.
    pub fn record_wait(wait: Duration) {
        histogram!("kasir_lock_wait_duration_seconds").record(wait.as_secs_f64());
    }

    /// Record a lock acquisition timeout.
    pub fn record_timeout() {
        counter!("kasir_lock_timeouts_total").increment(1);
    }
}

/// Commit pipeline metrics recorder.
pub struct CommitMetrics;

impl CommitMetrics {
    /// Record a successful commit.
    pub fn record_commit(duration: Duration, materialized: usize, decrements: usize) {
        counter!("kasir_transactions_committed_total").increment(1);
        histogram!("kasir_commit_duration_seconds").record(duration.as_secs_f64());
        counter!("kasir_custom_items_materialized_total").increment(materialized as u64);
        counter!("kasir_stock_decrements_total").increment(decrements as u64);
    }

    /// Record a failed commit, labelled by the step that failed.
    pub fn record_failure(step: &'static str) {
        counter!("kasir_transactions_failed_total", "step" => step).increment(1);
    }
}

/// Record a cash note.
pub fn record_cash_note() {
    counter!("kasir_cash_notes_total").increment(1);
}

/// Action label for envelopes that did not parse into a known action.
pub const INVALID_ACTION_LABEL: &str = "invalid";

/// Record a handled envelope request.
///
/// `action` is a known action's wire name or [`INVALID_ACTION_LABEL`], never
/// the raw client string.
pub fn record_request(action: &'static str, status: &'static str) {
    counter!("kasir_requests_total", "action" => action, "status" => status).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_before_install_is_none() {
        let exporter = MetricsExporter::new();
        assert!(exporter.handle().is_none());
        assert!(exporter.render().is_none());
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        SerializerMetrics::record_wait(Duration::from_millis(5));
        SerializerMetrics::record_timeout();
        CommitMetrics::record_commit(Duration::from_millis(10), 1, 2);
        CommitMetrics::record_failure("append_ledger");
        record_cash_note();
        record_request("recordTransaction", "success");
    }
}
