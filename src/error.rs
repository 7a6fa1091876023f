use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to detect encoding for {}", path.display())]
    Encoding { path: PathBuf },

    #[error("Target directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Target already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Schema validation failed: {0}")]
    Schema(String),
}

pub type Result<T> = std::result::Result<T, PrepError>;
