//! `data_profile_summary.json`: a passive description of every CSV export
//! under a root directory (encoding, size estimate, columns).

use crate::error::{PrepError, Result};
use crate::table::{self, detect, DetectionStrategy, SourceEncoding};
use csv::ReaderBuilder;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{error, info, instrument};

/// Bundled JSON schema for the summary file
pub const PROFILE_SCHEMA: &str = include_str!("../schemas/data_profile_summary.v1.json");

/// One entry of the profile summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileProfile {
    /// Path relative to the scanned root, `/`-separated
    pub file: String,
    pub encoding: SourceEncoding,
    pub total_rows_est: u64,
    pub sample_rows: u64,
    pub n_cols: usize,
    pub columns: Vec<String>,
}

/// Profile a single file, reading at most `sample_limit` data rows
pub fn profile_file(root: &Path, path: &Path, sample_limit: usize) -> Result<FileProfile> {
    let bytes = fs::read(path)?;
    let (encoding, text) = detect(&bytes, DetectionStrategy::FirstMatch).ok_or_else(|| {
        PrepError::Encoding {
            path: path.to_path_buf(),
        }
    })?;

    let mut reader = ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let header_end = reader.position().byte();

    let sample_limit = sample_limit.max(1);
    let mut sample_rows: u64 = 0;
    let mut exhausted = true;
    for record in reader.records() {
        record?;
        sample_rows += 1;
        if sample_rows as usize >= sample_limit {
            exhausted = false;
            break;
        }
    }
    let sample_end = reader.position().byte();
    // A full sample may still be the whole file
    if !exhausted && reader.records().next().is_none() {
        exhausted = true;
    }

    let total_rows_est = if exhausted || sample_rows == 0 {
        sample_rows
    } else {
        let sampled_bytes = sample_end.saturating_sub(header_end).max(1);
        let body_bytes = (text.len() as u64).saturating_sub(header_end);
        let mean_row_bytes = sampled_bytes as f64 / sample_rows as f64;
        (body_bytes as f64 / mean_row_bytes).round() as u64
    };

    Ok(FileProfile {
        file: relative_label(root, path),
        encoding,
        total_rows_est,
        sample_rows,
        n_cols: columns.len(),
        columns,
    })
}

/// Profile every CSV below `root`. Files that cannot be read are logged and skipped.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn profile_directory(root: &Path, sample_limit: usize) -> Result<Vec<FileProfile>> {
    if !root.exists() {
        return Err(PrepError::MissingDirectory(root.to_path_buf()));
    }

    let mut profiles = Vec::new();
    for path in table::csv_files_recursive(root)? {
        match profile_file(root, &path, sample_limit) {
            Ok(profile) => profiles.push(profile),
            Err(e) => error!(path = %path.display(), "Failed to profile file: {}", e),
        }
    }
    info!("Profiled {} files", profiles.len());
    Ok(profiles)
}

/// Write the summary as pretty JSON (non-ASCII kept verbatim)
pub fn write_summary(path: &Path, profiles: &[FileProfile]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(profiles)?;
    fs::write(path, json)?;
    Ok(())
}

/// Validate a summary document against the bundled schema
pub fn validate_summary(document: &serde_json::Value) -> Result<()> {
    let schema: serde_json::Value = serde_json::from_str(PROFILE_SCHEMA)?;
    let compiled = JSONSchema::options()
        .compile(&schema)
        .map_err(|e| PrepError::Schema(e.to_string()))?;

    let result = compiled.validate(document);
    if let Err(errors) = result {
        let messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(PrepError::Schema(messages.join("; ")));
    }
    Ok(())
}

/// Read and validate a summary file
pub fn validate_summary_file(path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path)?;
    let document: serde_json::Value = serde_json::from_str(&content)?;
    validate_summary(&document)?;
    Ok(document.as_array().map_or(0, Vec::len))
}

fn relative_label(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_small_file_is_counted_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("visits.csv");
        fs::write(&path, "지역,방문자수\n서울,1\n부산,2\n").unwrap();

        let profile = profile_file(dir.path(), &path, 1000).unwrap();
        assert_eq!(profile.file, "visits.csv");
        assert_eq!(profile.encoding, SourceEncoding::Utf8);
        assert_eq!(profile.sample_rows, 2);
        assert_eq!(profile.total_rows_est, 2);
        assert_eq!(profile.columns, vec!["지역", "방문자수"]);
    }

    #[test]
    fn test_large_file_is_estimated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.csv");
        let mut content = String::from("id,value\n");
        for i in 0..100 {
            content.push_str(&format!("{:03},x\n", i));
        }
        fs::write(&path, content).unwrap();

        let profile = profile_file(dir.path(), &path, 10).unwrap();
        assert_eq!(profile.sample_rows, 10);
        assert_eq!(profile.total_rows_est, 100);
    }

    #[test]
    fn test_summary_serializes_korean_verbatim() {
        let profile = FileProfile {
            file: "a/관광.csv".into(),
            encoding: SourceEncoding::Cp949,
            total_rows_est: 3,
            sample_rows: 3,
            n_cols: 1,
            columns: vec!["지역".into()],
        };
        let json = serde_json::to_string(&vec![profile]).unwrap();
        assert!(json.contains("관광"));
        assert!(json.contains("\"cp949\""));
        validate_summary(&serde_json::from_str(&json).unwrap()).unwrap();
    }

    #[test]
    fn test_schema_rejects_missing_columns() {
        let document = serde_json::json!([{ "file": "a.csv", "encoding": "utf-8" }]);
        assert!(validate_summary(&document).is_err());
    }

    #[test]
    fn test_unreadable_files_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "x,y\n1,2\n").unwrap();
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("지역,값\n서울,1\n");
        let mut broken = encoded.into_owned();
        broken.push(0xFF);
        fs::write(dir.path().join("b.csv"), broken).unwrap();

        let profiles = profile_directory(dir.path(), 1000).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].file, "a.csv");
    }
}
