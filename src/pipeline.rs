use crate::config::Config;
use crate::dates;
use crate::error::Result;
use crate::layout::{self, files, folders, reorganize};
use crate::profile;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, instrument};

/// Result of one pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: &'static str,
    pub processed: usize,
    pub errors: Vec<String>,
    pub duration_secs: f64,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub started_at: DateTime<Utc>,
    pub steps: Vec<StepResult>,
    pub profile_output: Option<PathBuf>,
    /// Set when a layout step failed and the run stopped
    pub aborted: Option<String>,
}

impl PipelineResult {
    pub fn total_errors(&self) -> usize {
        self.steps.iter().map(|s| s.errors.len()).sum::<usize>() + usize::from(self.aborted.is_some())
    }
}

type LayoutStep = fn(&Path, u32) -> Result<usize>;

fn rename_folders(root: &Path, _max_index: u32) -> Result<usize> {
    layout::apply_renames(&folders::plan_folder_renames(root)?)
}

fn rename_files(root: &Path, _max_index: u32) -> Result<usize> {
    layout::apply_renames(&files::plan_file_renames(root)?)
}

fn reorganize_into_index_folders(root: &Path, max_index: u32) -> Result<usize> {
    let plan = reorganize::plan_reorganize(root, max_index)?;
    let outcome = reorganize::apply_reorganize(root, max_index, &plan)?;
    Ok(outcome.moved_files)
}

/// A whole-batch failure becomes the step's only error so later steps still run
fn batch_step(step: &'static str, outcome: Result<dates::BatchOutcome>, duration_secs: f64) -> StepResult {
    match outcome {
        Ok(outcome) => StepResult {
            step,
            processed: outcome.processed,
            errors: outcome.errors,
            duration_secs,
        },
        Err(e) => {
            error!(step, "Step failed: {}", e);
            StepResult {
                step,
                processed: 0,
                errors: vec![e.to_string()],
                duration_secs,
            }
        }
    }
}

pub struct Pipeline;

impl Pipeline {
    fn timed<T>(step: &'static str, f: impl FnOnce() -> Result<T>) -> (Result<T>, f64) {
        let started = Instant::now();
        let result = f();
        let secs = started.elapsed().as_secs_f64();
        histogram!("prep_step_duration_seconds", "step" => step).record(secs);
        (result, secs)
    }

    /// Run rename-folders, rename-files, reorganize, normalize-dates,
    /// cleanup-dates and profile in that order. A layout failure stops the
    /// run; per-file date failures are collected and the run continues.
    #[instrument(skip(config), fields(root = %config.all_data_path().display()))]
    pub fn run(config: &Config) -> Result<PipelineResult> {
        let root = config.all_data_path();
        info!("🚀 Starting pipeline");
        counter!("prep_pipeline_runs_total").increment(1);

        let mut result = PipelineResult {
            started_at: Utc::now(),
            steps: Vec::new(),
            profile_output: None,
            aborted: None,
        };

        let layout_steps: [(&'static str, LayoutStep); 3] = [
            ("rename_folders", rename_folders),
            ("rename_files", rename_files),
            ("reorganize", reorganize_into_index_folders),
        ];

        for (step, run) in layout_steps {
            let (outcome, duration_secs) = Self::timed(step, || run(&root, config.max_index));
            match outcome {
                Ok(processed) => {
                    info!(step, processed, "✅ Step finished");
                    result.steps.push(StepResult {
                        step,
                        processed,
                        errors: Vec::new(),
                        duration_secs,
                    });
                }
                Err(e) => {
                    error!(step, "Layout step failed, stopping: {}", e);
                    counter!("prep_pipeline_aborts_total", "step" => step).increment(1);
                    result.aborted = Some(format!("{}: {}", step, e));
                    return Ok(result);
                }
            }
        }

        let (normalized, duration_secs) =
            Self::timed("normalize_dates", || dates::normalize_all(&root, config.max_index));
        result.steps.push(batch_step("normalize_dates", normalized, duration_secs));

        let (cleaned, duration_secs) = Self::timed("cleanup_dates", || dates::cleanup_all(&root));
        result.steps.push(batch_step("cleanup_dates", cleaned, duration_secs));

        let output = config.profile_output_path();
        let (profiles, duration_secs) = Self::timed("profile", || {
            let profiles = profile::profile_directory(&config.data_root, config.profile.sample_limit)?;
            profile::write_summary(&output, &profiles)?;
            Ok(profiles.len())
        });
        let mut step = StepResult {
            step: "profile",
            processed: 0,
            errors: Vec::new(),
            duration_secs,
        };
        match profiles {
            Ok(processed) => {
                step.processed = processed;
                result.profile_output = Some(output);
            }
            Err(e) => {
                error!(step = "profile", "Profile step failed: {}", e);
                step.errors.push(e.to_string());
            }
        }
        result.steps.push(step);

        info!(errors = result.total_errors(), "🏁 Pipeline finished");
        Ok(result)
    }
}
