use super::split::SplitBoundaries;
use super::DatasetConfig;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub input_rows: usize,
    /// Rows without a valid year/month
    pub skipped_rows: usize,
    pub groups: usize,
    pub months: usize,
    pub train: usize,
    pub valid: usize,
    pub test: usize,
    pub dropped_windows: usize,
}

/// `manifest.json`: what was built, from what, and checksums of each file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub input: PathBuf,
    pub config: DatasetConfig,
    pub counts: DatasetCounts,
    pub split: SplitBoundaries,
    /// File name to lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(
        input: &Path,
        config: DatasetConfig,
        counts: DatasetCounts,
        split: SplitBoundaries,
        files: BTreeMap<String, String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            input: input.to_path_buf(),
            config,
            counts,
            split,
            files,
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write `bytes` to `path` and return their SHA-256
pub fn write_with_checksum(path: &Path, bytes: &[u8]) -> Result<String> {
    fs::write(path, bytes)?;
    Ok(sha256_hex(bytes))
}
