//! Model-ready datasets: a monthly panel keyed by `target_month`, lag/lead
//! features, a chronological split, a scaler fitted on the training months
//! and sliding windows written as JSONL.

pub mod features;
pub mod manifest;
pub mod panel;
pub mod scaler;
pub mod split;
pub mod window;

pub use manifest::{DatasetCounts, Manifest};
pub use panel::{Panel, Series};
pub use scaler::{ColumnScale, Scaler};
pub use split::{ChronoSplit, Split};
pub use window::WindowRecord;

use crate::constants::{MONTH_COLUMN, YEAR_COLUMN};
use crate::error::{PrepError, Result};
use crate::table::{self, parse_number, DetectionStrategy, Table};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// How missing cells are filled after the panel is resampled to a
/// continuous monthly index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    /// Leave gaps missing; windows touching them are dropped
    #[default]
    None,
    /// Carry the last observed value forward within a group
    Ffill,
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScalerKind {
    None,
    Minmax,
    #[default]
    Standard,
}

/// Train/valid ratios; the test split takes the remaining months
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRatios {
    pub train: f64,
    pub valid: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self { train: 0.7, valid: 0.15 }
    }
}

/// `[dataset]` section of `prep.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Normalized CSV with `year`/`month` columns
    pub input: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Panel keys, used when present in the input
    pub group_keys: Vec<String>,
    /// Empty means every numeric column that is not a key or time column
    pub features: Vec<String>,
    pub target: Option<String>,
    pub lags: Vec<usize>,
    pub leads: Vec<usize>,
    /// Input months per window
    pub window: usize,
    /// Months between the last input month and the target month
    pub horizon: usize,
    pub fill: FillMethod,
    pub scaler: ScalerKind,
    pub split: SplitRatios,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: PathBuf::from("dataset"),
            group_keys: vec!["region_id".to_string(), "category_id".to_string()],
            features: Vec::new(),
            target: None,
            lags: vec![1, 12],
            leads: Vec::new(),
            window: 12,
            horizon: 1,
            fill: FillMethod::default(),
            scaler: ScalerKind::default(),
            split: SplitRatios::default(),
        }
    }
}

impl DatasetConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.window == 0 {
            return Err("dataset.window must be > 0".to_string());
        }
        if self.horizon == 0 {
            return Err("dataset.horizon must be > 0".to_string());
        }
        if self.lags.iter().chain(&self.leads).any(|&k| k == 0) {
            return Err("dataset.lags and dataset.leads must be > 0".to_string());
        }
        let SplitRatios { train, valid } = self.split;
        if !(train > 0.0 && train <= 1.0) || !(0.0..1.0).contains(&valid) {
            return Err("dataset.split ratios must be within (0, 1]".to_string());
        }
        if train + valid > 1.0 {
            return Err("dataset.split.train + dataset.split.valid must be <= 1.0".to_string());
        }
        Ok(())
    }
}

/// Outcome of `build-dataset`
#[derive(Debug, Clone, Serialize)]
pub struct DatasetOutcome {
    pub output_dir: PathBuf,
    pub manifest: Manifest,
}

/// Numeric columns that can serve as features by default
pub fn numeric_columns(table: &Table, exclude: &[String]) -> Vec<String> {
    table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            name.as_str() != YEAR_COLUMN && name.as_str() != MONTH_COLUMN && !exclude.contains(name)
        })
        .filter(|(index, _)| {
            let present = table.present_values(*index);
            !present.is_empty() && present.iter().all(|v| parse_number(v).is_some())
        })
        .map(|(_, name)| name.clone())
        .collect()
}

/// Build every split from an in-memory table
pub fn build_from_table(
    table: &Table,
    config: &DatasetConfig,
) -> Result<(Scaler, ChronoSplit, window::WindowSet, DatasetCounts)> {
    let target = config
        .target
        .clone()
        .ok_or_else(|| PrepError::Config("dataset.target is required".to_string()))?;
    if !table.has_column(&target) {
        return Err(PrepError::MissingColumn(target));
    }

    let group_keys: Vec<String> = config
        .group_keys
        .iter()
        .filter(|k| table.has_column(k))
        .cloned()
        .collect();

    let base_features = if config.features.is_empty() {
        numeric_columns(table, &group_keys)
    } else {
        for feature in &config.features {
            if !table.has_column(feature) {
                return Err(PrepError::MissingColumn(feature.clone()));
            }
        }
        config.features.clone()
    };

    let mut value_columns = base_features.clone();
    if !value_columns.contains(&target) {
        value_columns.push(target.clone());
    }

    let mut panel = Panel::from_table(table, &group_keys, &value_columns)?;
    panel.fill(config.fill);

    let derived = features::add_shifted(&mut panel, &base_features, &config.lags, &config.leads)?;
    let mut input_columns = base_features;
    input_columns.extend(derived);

    let split = ChronoSplit::from_months(panel.months(), config.split)?;
    let scaler = Scaler::fit(config.scaler, &panel, &split)?;

    let windows = window::build_windows(
        &panel,
        &scaler,
        &split,
        &input_columns,
        &target,
        config.window,
        config.horizon,
    )?;

    let counts = DatasetCounts {
        input_rows: table.rows.len(),
        skipped_rows: panel.skipped_rows,
        groups: panel.series.len(),
        months: split.months.len(),
        train: windows.train.len(),
        valid: windows.valid.len(),
        test: windows.test.len(),
        dropped_windows: windows.dropped,
    };

    Ok((scaler, split, windows, counts))
}

/// Read `input`, build the dataset and write it to `output_dir`
#[instrument(skip_all, fields(input = %input.display(), output = %output_dir.display()))]
pub fn build_dataset(input: &Path, output_dir: &Path, config: &DatasetConfig) -> Result<DatasetOutcome> {
    let started = Instant::now();
    config.validate().map_err(PrepError::Config)?;

    let table = table::read_table(input, DetectionStrategy::HeaderScore)?;
    let (scaler, split, windows, counts) = build_from_table(&table, config)?;

    if counts.train == 0 {
        warn!("No complete training windows; check window, horizon and fill settings");
    }

    fs::create_dir_all(output_dir)?;
    let mut checksums = std::collections::BTreeMap::new();
    for (name, records) in [
        ("train.jsonl", &windows.train),
        ("valid.jsonl", &windows.valid),
        ("test.jsonl", &windows.test),
    ] {
        let bytes = window::to_jsonl(records)?;
        checksums.insert(name.to_string(), manifest::write_with_checksum(&output_dir.join(name), &bytes)?);
    }
    let scaler_bytes = serde_json::to_vec_pretty(&scaler)?;
    checksums.insert(
        "scaler.json".to_string(),
        manifest::write_with_checksum(&output_dir.join("scaler.json"), &scaler_bytes)?,
    );

    let manifest = Manifest::new(input, config.clone(), counts, split.boundaries(), checksums);
    fs::write(output_dir.join("manifest.json"), serde_json::to_vec_pretty(&manifest)?)?;

    counter!("prep_dataset_windows_total", "split" => "train").increment(manifest.counts.train as u64);
    counter!("prep_dataset_windows_total", "split" => "valid").increment(manifest.counts.valid as u64);
    counter!("prep_dataset_windows_total", "split" => "test").increment(manifest.counts.test as u64);
    histogram!("prep_dataset_build_seconds").record(started.elapsed().as_secs_f64());

    info!(
        run_id = %manifest.run_id,
        train = manifest.counts.train,
        valid = manifest.counts.valid,
        test = manifest.counts.test,
        dropped = manifest.counts.dropped_windows,
        "Dataset written to {}",
        output_dir.display()
    );

    Ok(DatasetOutcome {
        output_dir: output_dir.to_path_buf(),
        manifest,
    })
}
