use crate::constants::{
    DATA_ROOT_ENV, DEFAULT_BASE_END, DEFAULT_BASE_START, DEFAULT_MAX_INDEX, DEFAULT_MAX_SEGMENTS,
    DEFAULT_SAMPLE_LIMIT, PROFILE_FILE_NAME,
};
use crate::dataset::DatasetConfig;
use crate::error::{PrepError, Result};
use crate::quality::QualityGateConfig;
use crate::types::{MonthRange, YearMonth};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings read from `prep.toml`; every field has a default
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_root: PathBuf,
    /// DataLab exports, relative to `data_root`
    pub all_data_dir: PathBuf,
    /// Visitor exports checked for missing periods, relative to `data_root`
    pub coverage_dir: PathBuf,
    pub max_index: u32,
    pub log_dir: String,
    pub coverage: CoverageConfig,
    pub profile: ProfileConfig,
    pub quality: QualityGateConfig,
    pub dataset: DatasetConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub base_start: u32,
    pub base_end: u32,
    pub max_segments: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub sample_limit: usize,
    /// Output path, relative to `data_root` unless absolute
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Where to write a Prometheus text snapshot after each command
    pub snapshot_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data_csv_type"),
            all_data_dir: PathBuf::from("데이터랩").join("all_data"),
            coverage_dir: PathBuf::from("내외국인"),
            max_index: DEFAULT_MAX_INDEX,
            log_dir: "logs".to_string(),
            coverage: CoverageConfig::default(),
            profile: ProfileConfig::default(),
            quality: QualityGateConfig::default(),
            dataset: DatasetConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            base_start: DEFAULT_BASE_START,
            base_end: DEFAULT_BASE_END,
            max_segments: DEFAULT_MAX_SEGMENTS,
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            output: PathBuf::from(PROFILE_FILE_NAME),
        }
    }
}

impl CoverageConfig {
    pub fn base_range(&self) -> Result<MonthRange> {
        let start = YearMonth::from_key(self.base_start)
            .ok_or_else(|| PrepError::Config(format!("invalid base_start {}", self.base_start)))?;
        let end = YearMonth::from_key(self.base_end)
            .ok_or_else(|| PrepError::Config(format!("invalid base_end {}", self.base_end)))?;
        if start > end {
            return Err(PrepError::Config(format!(
                "base_start {} is after base_end {}",
                self.base_start, self.base_end
            )));
        }
        Ok(MonthRange::new(start, end))
    }
}

impl Config {
    /// Load configuration from `path`. A missing file yields the defaults;
    /// the data root can then be overridden through the environment.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                PrepError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
            if !root.trim().is_empty() {
                config.data_root = PathBuf::from(root);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_index == 0 {
            return Err(PrepError::Config("max_index must be > 0".to_string()));
        }
        self.coverage.base_range()?;
        self.quality.validate().map_err(PrepError::Config)?;
        self.dataset.validate().map_err(PrepError::Config)?;
        Ok(())
    }

    pub fn all_data_path(&self) -> PathBuf {
        self.data_root.join(&self.all_data_dir)
    }

    pub fn coverage_path(&self) -> PathBuf {
        self.data_root.join(&self.coverage_dir)
    }

    pub fn profile_output_path(&self) -> PathBuf {
        self.data_root.join(&self.profile.output)
    }
}
