//! Date handling for the monthly exports: detect date columns, add
//! canonical `year`/`month` columns, then drop the redundant originals.

pub mod cleanup;
pub mod detect;
pub mod normalize;

use crate::error::{PrepError, Result};
use crate::table;
use metrics::counter;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

/// Outcome of a batch over many files; per-file failures do not stop the batch
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    fn record<T>(&mut self, step: &'static str, path: &Path, result: Result<T>) {
        match result {
            Ok(_) => {
                self.processed += 1;
                counter!("prep_files_processed_total", "step" => step).increment(1);
            }
            Err(e) => {
                error!(step, path = %path.display(), "Processing failed: {}", e);
                counter!("prep_files_failed_total", "step" => step).increment(1);
                self.errors.push(format!("{}: {}", path.display(), e));
            }
        }
    }
}

/// Normalize every CSV directly inside the index folders `root/1..=max_index`
pub fn normalize_all(root: &Path, max_index: u32) -> Result<BatchOutcome> {
    if !root.exists() {
        return Err(PrepError::MissingDirectory(root.to_path_buf()));
    }

    let mut outcome = BatchOutcome::default();
    for index in 1..=max_index {
        let folder = root.join(index.to_string());
        if !folder.exists() {
            continue;
        }
        for path in table::csv_files_in(&folder)? {
            let result = normalize::normalize_file(&path);
            outcome.record("normalize_dates", &path, result);
        }
    }
    info!("Processed {} files.", outcome.processed);
    Ok(outcome)
}

/// Clean every CSV anywhere below `root`
pub fn cleanup_all(root: &Path) -> Result<BatchOutcome> {
    if !root.exists() {
        return Err(PrepError::MissingDirectory(root.to_path_buf()));
    }

    let mut outcome = BatchOutcome::default();
    for path in table::csv_files_recursive(root)? {
        let result = cleanup::cleanup_file(&path);
        outcome.record("cleanup_dates", &path, result);
    }
    info!("Cleaned {} files.", outcome.processed);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::EUC_KR;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_undecodable_korean_file_is_reported_and_left_alone() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("1");
        fs::create_dir(&folder).unwrap();
        let (encoded, _, _) = EUC_KR.encode("기준년월,방문자수\n202001,10\n");
        let mut bytes = encoded.into_owned();
        bytes.push(0xFF);
        let path = folder.join("202001-202012_방문자수.csv");
        fs::write(&path, &bytes).unwrap();

        let normalized = normalize_all(dir.path(), 1).unwrap();
        assert_eq!(normalized.processed, 0);
        assert_eq!(normalized.errors.len(), 1);

        let cleaned = cleanup_all(dir.path()).unwrap();
        assert_eq!(cleaned.errors.len(), 1);
        assert_eq!(fs::read(&path).unwrap(), bytes);
    }
}
