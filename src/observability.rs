//! Observability module for structured logging, spans and metrics.
//!
//! This module provides:
//! - Structured logging with configurable level and format
//! - Tracing span helpers for sweeps and artifact output
//! - Metrics recording through the `metrics` facade (no-op until the
//!   embedding application installs a recorder)

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::ObservabilityConfig;

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("doc_binarize={}", config.log_level.to_lowercase()).parse()?)
        .add_directive(format!("binarize={}", config.log_level.to_lowercase()).parse()?)
        .add_directive(format!("binarization={}", config.log_level.to_lowercase()).parse()?);

    if config.use_pretty_format() {
        // Pretty formatting for development
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?;
    } else {
        // JSON formatting for production
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span covering one parameter sweep
pub fn sweep_span(mode: &str, entries: usize) -> tracing::Span {
    tracing::info_span!(
        "sweep_operation",
        mode = mode,
        entries = entries,
        component = "sweep"
    )
}

/// Create a span for writing sweep artifacts
pub fn output_span(operation: &str, root: &str) -> tracing::Span {
    tracing::info_span!(
        "output_operation",
        operation = operation,
        root = root,
        component = "output"
    )
}

/// Record one thresholding call
pub fn record_binarization_metrics(method: &'static str, duration: Duration) {
    metrics::counter!("binarization_operations_total", "method" => method).increment(1);
    metrics::histogram!("binarization_duration_seconds", "method" => method)
        .record(duration.as_secs_f64());
}

/// Record a completed sweep
pub fn record_sweep_metrics(mode: &str, entries: usize, duration: Duration) {
    let mode = mode.to_string();
    metrics::counter!("sweep_entries_total", "mode" => mode.clone()).increment(entries as u64);
    metrics::histogram!("sweep_duration_seconds", "mode" => mode).record(duration.as_secs_f64());
}

/// Record files written for one category
pub fn record_artifact_metrics(category: &str, count: usize, bytes: u64) {
    let category = category.to_string();
    metrics::counter!("artifacts_written_total", "category" => category.clone())
        .increment(count as u64);
    metrics::histogram!("artifact_bytes", "category" => category).record(bytes as f64);
}

/// Record errors by component
pub fn record_error_metrics(error_type: &str, component: &str) {
    let error_type = error_type.to_string();
    let component = component.to_string();
    metrics::counter!("errors_total", "type" => error_type, "component" => component).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        record_binarization_metrics("otsu", Duration::from_millis(3));
        record_sweep_metrics("sequential", 4, Duration::from_millis(12));
        record_artifact_metrics("sauvola", 2, 2048);
        record_error_metrics("config", "sweep");
    }

    #[test]
    fn test_spans_can_be_entered() {
        let span = sweep_span("parallel", 3);
        let _enter = span.enter();
        let nested = output_span("write", "/tmp/out");
        let _nested = nested.enter();
    }
}
