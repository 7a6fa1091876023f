use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use tourism_prep::config::Config;
use tourism_prep::coverage;
use tourism_prep::dataset::{self, DatasetConfig, FillMethod, ScalerKind};
use tourism_prep::dates;
use tourism_prep::layout::{self, files, folders, reorganize, RenameOp};
use tourism_prep::logging::{self, LogFormat};
use tourism_prep::metrics;
use tourism_prep::pipeline::Pipeline;
use tourism_prep::profile;
use tourism_prep::quality::{self, DefaultQualityGate};

#[derive(Parser)]
#[command(name = "tourism_prep")]
#[command(about = "Preprocessing toolkit for Korean tourism CSV datasets")]
#[command(version)]
struct Cli {
    /// Configuration file; missing files fall back to defaults
    #[arg(long, global = true, default_value = "prep.toml")]
    config: PathBuf,

    /// Data root, overriding the config file and TOURISM_PREP_DATA_ROOT
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write data_profile_summary.json for every CSV under the data root
    Profile {
        #[arg(long)]
        sample_limit: Option<usize>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a profile summary against the bundled JSON schema
    ValidateProfile {
        /// Defaults to the configured profile output
        path: Option<PathBuf>,
    },
    /// Rename period folders to <period>_<n>
    RenameFolders {
        #[arg(long)]
        dry_run: bool,
    },
    /// Give every file the period prefix of its folder
    RenameFiles {
        #[arg(long)]
        dry_run: bool,
    },
    /// Move period folders into index folders 1..=max_index
    Reorganize {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        max_index: Option<u32>,
    },
    /// Add leading year/month columns to the files in the index folders
    NormalizeDates {
        #[arg(long)]
        max_index: Option<u32>,
    },
    /// Drop date columns made redundant by year/month
    CleanupDates,
    /// Report months missing from each export against the base period
    MissingPeriods {
        /// Directory to check, defaults to the configured coverage directory
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        base_start: Option<u32>,
        #[arg(long)]
        base_end: Option<u32>,
    },
    /// Assess normalized tables and write a JSON quality report
    Quality {
        /// Directory to assess, defaults to the DataLab directory
        #[arg(long)]
        dir: Option<PathBuf>,
        #[arg(long, default_value = "quality_report.json")]
        output: PathBuf,
    },
    /// Build train/valid/test windows from a normalized table
    BuildDataset(DatasetArgs),
    /// Run the layout and date steps, then profile
    Run,
}

/// `build-dataset` flags; each one overrides the `[dataset]` setting
#[derive(Args, Debug, Default)]
struct DatasetArgs {
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    target: Option<String>,
    /// Comma-separated panel key columns
    #[arg(long, value_delimiter = ',')]
    group_keys: Option<Vec<String>>,
    /// Comma-separated feature columns (default: every numeric column)
    #[arg(long, value_delimiter = ',')]
    features: Option<Vec<String>>,
    #[arg(long, value_delimiter = ',')]
    lags: Option<Vec<usize>>,
    #[arg(long, value_delimiter = ',')]
    leads: Option<Vec<usize>>,
    #[arg(long)]
    window: Option<usize>,
    #[arg(long)]
    horizon: Option<usize>,
    #[arg(long, value_enum)]
    fill: Option<FillMethod>,
    #[arg(long, value_enum)]
    scaler: Option<ScalerKind>,
    #[arg(long)]
    train_ratio: Option<f64>,
    #[arg(long)]
    valid_ratio: Option<f64>,
}

impl DatasetArgs {
    fn apply(self, config: &mut DatasetConfig) {
        if let Some(input) = self.input {
            config.input = Some(input);
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        config.target = self.target.or(config.target.take());
        if let Some(group_keys) = self.group_keys {
            config.group_keys = group_keys;
        }
        if let Some(features) = self.features {
            config.features = features;
        }
        if let Some(lags) = self.lags {
            config.lags = lags;
        }
        if let Some(leads) = self.leads {
            config.leads = leads;
        }
        config.window = self.window.unwrap_or(config.window);
        config.horizon = self.horizon.unwrap_or(config.horizon);
        config.fill = self.fill.unwrap_or(config.fill);
        config.scaler = self.scaler.unwrap_or(config.scaler);
        config.split.train = self.train_ratio.unwrap_or(config.split.train);
        config.split.valid = self.valid_ratio.unwrap_or(config.split.valid);
    }
}

fn resolve(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

fn print_plan(ops: &[RenameOp]) {
    if ops.is_empty() {
        println!("   Nothing to rename");
    }
    for op in ops {
        println!("   {}", op.describe());
    }
}

fn run_renames(ops: Vec<RenameOp>, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("📝 Planned renames:");
        print_plan(&ops);
        return Ok(());
    }
    let count = layout::apply_renames(&ops)?;
    println!("✅ Renamed {} entries", count);
    Ok(())
}

fn report_batch(label: &str, outcome: &dates::BatchOutcome) {
    println!("✅ {}: {} files", label, outcome.processed);
    if !outcome.errors.is_empty() {
        warn!("{} errors encountered", outcome.errors.len());
        println!("\n⚠️  Errors encountered:");
        for error in &outcome.errors {
            println!("   - {}", error);
        }
    }
}

fn execute(command: Commands, config: &Config) -> Result<()> {
    let all_data = config.all_data_path();

    match command {
        Commands::Profile { sample_limit, output } => {
            let sample_limit = sample_limit.unwrap_or(config.profile.sample_limit);
            let output = output.unwrap_or_else(|| config.profile_output_path());
            let profiles = profile::profile_directory(&config.data_root, sample_limit)
                .with_context(|| format!("Failed to profile {}", config.data_root.display()))?;
            profile::write_summary(&output, &profiles)?;
            println!("💾 Saved profile summary to {} ({} files)", output.display(), profiles.len());
        }
        Commands::ValidateProfile { path } => {
            let path = path.unwrap_or_else(|| config.profile_output_path());
            let count = profile::validate_summary_file(&path)
                .with_context(|| format!("Invalid profile summary {}", path.display()))?;
            println!("✅ {} is valid ({} entries)", path.display(), count);
        }
        Commands::RenameFolders { dry_run } => {
            let ops = folders::plan_folder_renames(&all_data)?;
            run_renames(ops, dry_run)?;
        }
        Commands::RenameFiles { dry_run } => {
            let ops = files::plan_file_renames(&all_data)?;
            run_renames(ops, dry_run)?;
        }
        Commands::Reorganize { dry_run, max_index } => {
            let max_index = max_index.unwrap_or(config.max_index);
            let plan = reorganize::plan_reorganize(&all_data, max_index)?;
            if dry_run {
                println!("📝 Planned moves:");
                print_plan(&plan.moves);
                for folder in &plan.emptied {
                    println!("   remove {}", folder.display());
                }
                return Ok(());
            }
            let outcome = reorganize::apply_reorganize(&all_data, max_index, &plan)?;
            println!(
                "✅ Moved {} files, removed {} folders",
                outcome.moved_files, outcome.removed_folders
            );
        }
        Commands::NormalizeDates { max_index } => {
            let outcome = dates::normalize_all(&all_data, max_index.unwrap_or(config.max_index))?;
            report_batch("Normalized", &outcome);
        }
        Commands::CleanupDates => {
            let outcome = dates::cleanup_all(&all_data)?;
            report_batch("Cleaned", &outcome);
        }
        Commands::MissingPeriods { dir, base_start, base_end } => {
            let mut coverage_config = config.coverage.clone();
            coverage_config.base_start = base_start.unwrap_or(coverage_config.base_start);
            coverage_config.base_end = base_end.unwrap_or(coverage_config.base_end);
            let base = coverage_config.base_range()?;

            let dir = dir.unwrap_or_else(|| config.coverage_path());
            let summaries = coverage::summarize_directory(&dir, &base, coverage_config.max_segments)?;
            if summaries.is_empty() {
                warn!("No CSV files found in {}", dir.display());
            }
            let paths = coverage::write_reports(&dir, &summaries, &base)?;
            println!("💾 Saved {}", paths.csv.display());
            println!("💾 Saved {}", paths.markdown.display());
        }
        Commands::Quality { dir, output } => {
            let dir = dir.unwrap_or_else(|| all_data.clone());
            let gate = DefaultQualityGate::with_config(config.quality.clone());
            let report = quality::assess_directory(&dir, &gate)?;
            let output = resolve(&config.data_root, output);
            std::fs::write(&output, serde_json::to_string_pretty(&report)?)
                .with_context(|| format!("Failed to write {}", output.display()))?;

            let stats = &report.stats;
            println!("\n📊 Quality Results:");
            println!("   Files: {}", stats.total_files);
            println!("   Accepted: {}", stats.accepted_count);
            println!("   Accepted with warnings: {}", stats.accepted_with_warnings_count);
            println!("   Quarantined: {}", stats.quarantined_count);
            println!("   Unreadable: {}", stats.unreadable_count);
            println!("💾 Saved report to {}", output.display());
        }
        Commands::BuildDataset(args) => {
            let mut dataset_config = config.dataset.clone();
            args.apply(&mut dataset_config);

            let Some(input) = dataset_config.input.clone() else {
                bail!("No dataset input: pass --input or set dataset.input");
            };
            let input = resolve(&config.data_root, input);
            let output = resolve(&config.data_root, dataset_config.output_dir.clone());

            let outcome = dataset::build_dataset(&input, &output, &dataset_config)
                .with_context(|| format!("Failed to build dataset from {}", input.display()))?;
            let counts = &outcome.manifest.counts;
            println!("\n📊 Dataset {}:", outcome.manifest.run_id);
            println!("   Groups: {}  Months: {}", counts.groups, counts.months);
            println!("   Train: {}  Valid: {}  Test: {}", counts.train, counts.valid, counts.test);
            println!("   Dropped windows: {}", counts.dropped_windows);
            println!("💾 Saved to {}", outcome.output_dir.display());
        }
        Commands::Run => {
            println!("🔄 Running preprocessing pipeline...");
            let result = Pipeline::run(config)?;
            println!("\n📊 Pipeline Results:");
            for step in &result.steps {
                println!(
                    "   {:<16} {:>5} files  {:>3} errors  {:.2}s",
                    step.step,
                    step.processed,
                    step.errors.len(),
                    step.duration_secs
                );
                for error in &step.errors {
                    println!("      - {}", error);
                }
            }
            if let Some(output) = &result.profile_output {
                println!("💾 Saved profile summary to {}", output.display());
            }
            if let Some(reason) = result.aborted {
                bail!("Pipeline stopped: {}", reason);
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    if let Some(root) = cli.root {
        config.data_root = root;
    }

    let _guard = logging::init_logging(&config.log_dir, cli.log_format);
    if config.metrics.snapshot_path.is_some() {
        metrics::init_metrics();
    }
    info!(data_root = %config.data_root.display(), "Starting tourism_prep");

    let result = execute(cli.command, &config);
    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }

    if let Some(path) = &config.metrics.snapshot_path {
        if let Err(e) = metrics::write_snapshot(path) {
            warn!("Failed to write metrics snapshot: {}", e);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_args(args: &[&str]) -> DatasetArgs {
        let mut argv = vec!["tourism_prep", "build-dataset"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::BuildDataset(args) => args,
            _ => panic!("expected build-dataset"),
        }
    }

    #[test]
    fn test_dataset_flags_override_config() {
        let mut config = DatasetConfig::default();
        dataset_args(&[
            "--target", "visitors", "--group-keys", "region_id", "--features", "visitors,spend",
            "--lags", "1,3", "--leads", "2", "--train-ratio", "0.8", "--valid-ratio", "0.1",
        ])
        .apply(&mut config);

        assert_eq!(config.target.as_deref(), Some("visitors"));
        assert_eq!(config.group_keys, vec!["region_id"]);
        assert_eq!(config.features, vec!["visitors", "spend"]);
        assert_eq!(config.lags, vec![1, 3]);
        assert_eq!(config.leads, vec![2]);
        assert_eq!(config.split.train, 0.8);
        assert_eq!(config.split.valid, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_absent_dataset_flags_keep_config() {
        let mut config = DatasetConfig {
            target: Some("spend".to_string()),
            ..DatasetConfig::default()
        };
        dataset_args(&[]).apply(&mut config);
        assert_eq!(config.target.as_deref(), Some("spend"));
        assert_eq!(config.lags, DatasetConfig::default().lags);
        assert_eq!(config.window, 12);
    }
}
