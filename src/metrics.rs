//! Prometheus recorder for the CLI. Commands are short-lived, so instead of
//! serving `/metrics` the rendered text is written to a snapshot file.

use crate::error::{PrepError, Result};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder. Idempotent; later calls are no-ops.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("Prometheus handle was already stored");
            }
            register_metrics();
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

fn register_metrics() {
    describe_counter!("prep_files_processed_total", "CSV files rewritten by a batch step");
    describe_counter!("prep_files_failed_total", "CSV files a batch step could not process");
    describe_counter!("prep_pipeline_runs_total", "Pipeline runs started");
    describe_counter!("prep_pipeline_aborts_total", "Pipeline runs stopped by a layout step");
    describe_counter!("prep_quality_decisions_total", "Quality gate decisions by outcome");
    describe_counter!("prep_dataset_windows_total", "Dataset windows written by split");
    describe_histogram!("prep_step_duration_seconds", Unit::Seconds, "Duration of each pipeline step");
    describe_histogram!("prep_dataset_build_seconds", Unit::Seconds, "Duration of build-dataset");
}

/// Current Prometheus text exposition, if a recorder is installed
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

/// Write the rendered metrics to `path`
pub fn write_snapshot(path: &Path) -> Result<()> {
    let text = render().ok_or_else(|| PrepError::Config("metrics recorder is not installed".to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    info!("Metrics snapshot written to {}", path.display());
    Ok(())
}
