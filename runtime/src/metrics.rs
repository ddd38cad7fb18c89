//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for:
//! - Reducer execution and effect handling (recorded by the Store)
//! - Interaction outcomes (recorded by the bot's HTTP layer)
//! - Counter store writes (recorded by `tally-sqlite`)
//!
//! # Example
//!
//! ```rust,no_run
//! use tally_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = MetricsRecorder::install()?;
//!
//! // Serve this from the /metrics route
//! let body = recorder.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other crates
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

/// Installed Prometheus recorder.
///
/// Metrics are rendered on demand; the HTTP route lives with the rest of the
/// bot's endpoints.
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    /// Install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built, or if another recorder
    /// is already installed in this process.
    pub fn install() -> Result<Self, MetricsError> {
        let handle = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .install_recorder()
            .map_err(|e| MetricsError::Install(e.to_string()))?;

        register_metrics();
        tracing::info!("Prometheus recorder installed");

        Ok(Self { handle })
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Store
    describe_counter!("store.actions.total", "Total number of actions reduced by the store");
    describe_histogram!("store.reducer.duration_seconds", "Time taken to run the reducer");
    describe_counter!("store.effects.executed", "Total number of effects executed, by type");
    describe_counter!("store.effects.panicked", "Total number of effect tasks that panicked");
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );

    // Interactions
    describe_counter!("interactions.received.total", "Interactions received, by kind");
    describe_counter!("interactions.outcome.total", "Interactions settled, by outcome");
    describe_histogram!(
        "interactions.response.duration_seconds",
        "Time from receiving an interaction to answering it"
    );

    // Counter store
    describe_counter!("counters.writes.total", "Counter store writes, by operation");
    describe_counter!("counters.wipes.total", "Full wipes performed");
}

/// Interaction metrics recorder.
pub struct InteractionMetrics;

impl InteractionMetrics {
    /// Record an interaction arriving.
    pub fn record_received(kind: &'static str) {
        counter!("interactions.received.total", "kind" => kind).increment(1);
    }

    /// Record how an interaction was settled and how long it took.
    pub fn record_outcome(outcome: &'static str, duration: Duration) {
        counter!("interactions.outcome.total", "outcome" => outcome).increment(1);
        histogram!("interactions.response.duration_seconds").record(duration.as_secs_f64());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // The global recorder can only be installed once per process, so every
    // assertion that needs it lives in this one test.
    #[test]
    fn test_recorder_renders_recorded_metrics() {
        let recorder = MetricsRecorder::install().unwrap();

        InteractionMetrics::record_received("button");
        InteractionMetrics::record_outcome("responded", Duration::from_millis(12));
        counter!("counters.writes.total", "operation" => "increment").increment(1);

        let rendered = recorder.render();
        assert!(rendered.contains("interactions_received_total"));
        assert!(rendered.contains("interactions_outcome_total"));
        assert!(rendered.contains("counters_writes_total"));

        assert!(matches!(MetricsRecorder::install(), Err(MetricsError::Install(_))));
    }
}
