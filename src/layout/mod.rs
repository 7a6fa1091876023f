//! Directory layout maintenance for the DataLab `all_data` tree.
//!
//! Each operation is split into a plan (pure directory inspection) and an
//! apply step, so `--dry-run` can print exactly what would happen.

pub mod files;
pub mod folders;
pub mod reorganize;

use crate::error::{PrepError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// A single filesystem rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameOp {
    pub from: PathBuf,
    pub to: PathBuf,
}

impl RenameOp {
    pub fn new(from: PathBuf, to: PathBuf) -> Self {
        Self { from, to }
    }

    /// Short `old -> new` form using file names only
    pub fn describe(&self) -> String {
        format!("{} -> {}", file_name(&self.from), file_name(&self.to))
    }
}

/// Execute renames in order, refusing to overwrite anything
pub fn apply_renames(ops: &[RenameOp]) -> Result<usize> {
    for op in ops {
        if op.to.exists() {
            return Err(PrepError::TargetExists(op.to.clone()));
        }
        fs::rename(&op.from, &op.to)?;
        info!("Renamed {}", op.describe());
    }
    Ok(ops.len())
}

/// Sorted subdirectories of `dir`
pub(crate) fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(PrepError::MissingDirectory(dir.to_path_buf()));
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Sorted entries (files and directories) of `dir`
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
