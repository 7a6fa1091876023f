//! Quality gate for normalized tables.
//!
//! Issues are flagged, never fixed: outliers in tourism series are often
//! real (festivals, closures) and need a domain expert to confirm.

mod stats;

pub use stats::{iqr_fences, quantile};

use crate::constants::{MONTH_COLUMN, YEAR_COLUMN};
use crate::coverage::months_to_ranges;
use crate::error::Result;
use crate::table::{self, parse_integer, parse_number, DetectionStrategy, Table};
use crate::types::{MonthRange, YearMonth};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{info, instrument};

/// Share of present values that must parse as numbers for a numeric column
const NUMERIC_SHARE: f64 = 0.9;

/// Quality assessment of one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub file: String,
    pub decision: QualityDecision,
    /// Overall quality score (0.0 to 1.0)
    pub quality_score: f64,
    pub issues: Vec<QualityIssue>,
    pub rule_version: String,
    pub assessed_at: DateTime<Utc>,
}

/// Quality Gate decision for a table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QualityDecision {
    /// Table meets quality standards
    Accept,
    /// Table has quality concerns but can be used
    AcceptWithWarnings,
    /// Table should be reviewed before modeling
    Quarantine,
}

/// Individual quality issue found during assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub issue_type: QualityIssueType,
    pub severity: QualitySeverity,
    pub description: String,
    /// Column that triggered this issue
    pub column: Option<String>,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QualityIssueType {
    /// Missing required data
    MissingData,
    /// Values that do not parse as expected
    InvalidFormat,
    /// Values outside the IQR fences
    SuspiciousValue,
    /// Gaps in the monthly sequence
    TemporalInconsistency,
    /// Repeated rows or keys
    DuplicationConcern,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualitySeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl QualityIssue {
    fn new(issue_type: QualityIssueType, severity: QualitySeverity, description: String) -> Self {
        Self {
            issue_type,
            severity,
            description,
            column: None,
            suggestion: None,
        }
    }

    fn on(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    fn suggest(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }
}

/// Configuration for quality assessment rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    /// Minimum quality score for acceptance
    pub min_quality_score: f64,
    pub rule_version: String,
    /// Share of rows with a missing year/month above which the issue is an Error
    pub max_missing_time_ratio: f64,
    /// Fence multiplier for outlier detection
    pub outlier_iqr_factor: f64,
    /// Share of outliers in a column above which the issue is a Warning
    pub max_outlier_ratio: f64,
    /// Panel key columns checked for duplicates together with year/month
    pub key_columns: Vec<String>,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            min_quality_score: 0.6,
            rule_version: "v1.0.0".to_string(),
            max_missing_time_ratio: 0.05,
            outlier_iqr_factor: 1.5,
            max_outlier_ratio: 0.05,
            key_columns: vec!["region_id".to_string(), "category_id".to_string()],
        }
    }
}

impl QualityGateConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_quality_score) {
            return Err("quality.min_quality_score must be between 0.0 and 1.0".to_string());
        }
        if !(0.0..=1.0).contains(&self.max_missing_time_ratio) {
            return Err("quality.max_missing_time_ratio must be between 0.0 and 1.0".to_string());
        }
        if self.outlier_iqr_factor <= 0.0 {
            return Err("quality.outlier_iqr_factor must be > 0".to_string());
        }
        Ok(())
    }
}

/// Trait for implementing table assessment logic
pub trait QualityGate {
    fn assess(&self, file: &str, table: &Table) -> QualityAssessment;
}

/// Default Quality Gate implementation with configurable rules
pub struct DefaultQualityGate {
    pub config: QualityGateConfig,
}

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self {
            config: QualityGateConfig::default(),
        }
    }

    pub fn with_config(config: QualityGateConfig) -> Self {
        Self { config }
    }

    fn assess_time_key(&self, table: &Table) -> Vec<QualityIssue> {
        let (Some(y), Some(m)) = (table.column_index(YEAR_COLUMN), table.column_index(MONTH_COLUMN)) else {
            return vec![QualityIssue::new(
                QualityIssueType::MissingData,
                QualitySeverity::Critical,
                "Table has no year/month columns".to_string(),
            )
            .suggest("Run normalize-dates first")];
        };

        let mut issues = Vec::new();
        let months: Vec<Option<YearMonth>> = table
            .rows
            .iter()
            .map(|row| {
                YearMonth::from_cells(parse_integer(&row[y])?, parse_integer(&row[m])?)
            })
            .collect();

        let missing = months.iter().filter(|m| m.is_none()).count();
        if missing > 0 {
            let ratio = missing as f64 / table.rows.len() as f64;
            let severity = if ratio > self.config.max_missing_time_ratio {
                QualitySeverity::Error
            } else {
                QualitySeverity::Warning
            };
            issues.push(
                QualityIssue::new(
                    QualityIssueType::MissingData,
                    severity,
                    format!("{} of {} rows have no valid year/month", missing, table.rows.len()),
                )
                .on(YEAR_COLUMN)
                .suggest("Check the source date columns or the file name period"),
            );
        }

        let present: BTreeSet<YearMonth> = months.iter().flatten().copied().collect();
        if let (Some(first), Some(last)) = (present.first(), present.last()) {
            let gaps: BTreeSet<YearMonth> = MonthRange::new(*first, *last)
                .months()
                .into_iter()
                .filter(|m| !present.contains(m))
                .collect();
            if !gaps.is_empty() {
                issues.push(
                    QualityIssue::new(
                        QualityIssueType::TemporalInconsistency,
                        QualitySeverity::Warning,
                        format!("{} months missing: {}", gaps.len(), months_to_ranges(&gaps, 6)),
                    )
                    .on(MONTH_COLUMN)
                    .suggest("Resample to a continuous monthly index before windowing"),
                );
            }
        }

        let key_indices: Vec<usize> = self
            .config
            .key_columns
            .iter()
            .filter_map(|k| table.column_index(k))
            .collect();
        if !key_indices.is_empty() {
            let mut seen = HashSet::new();
            let duplicates = table
                .rows
                .iter()
                .zip(&months)
                .filter_map(|(row, month)| {
                    let month = (*month)?;
                    let key: Vec<&str> = key_indices.iter().map(|&i| row[i].as_str()).collect();
                    Some((month, key))
                })
                .filter(|key| !seen.insert(key.clone()))
                .count();
            if duplicates > 0 {
                issues.push(
                    QualityIssue::new(
                        QualityIssueType::DuplicationConcern,
                        QualitySeverity::Error,
                        format!("{} rows repeat a (month, key) combination", duplicates),
                    )
                    .suggest("Aggregate duplicates before building panels"),
                );
            }
        }

        issues
    }

    fn assess_rows(&self, table: &Table) -> Vec<QualityIssue> {
        let mut seen = HashSet::new();
        let duplicates = table.rows.iter().filter(|row| !seen.insert(*row)).count();
        if duplicates == 0 {
            return Vec::new();
        }
        vec![QualityIssue::new(
            QualityIssueType::DuplicationConcern,
            QualitySeverity::Warning,
            format!("{} rows are exact duplicates", duplicates),
        )]
    }

    fn assess_columns(&self, table: &Table) -> Vec<QualityIssue> {
        let mut issues = Vec::new();

        for (index, column) in table.headers.iter().enumerate() {
            let present = table.present_values(index);
            if present.is_empty() {
                issues.push(
                    QualityIssue::new(
                        QualityIssueType::MissingData,
                        QualitySeverity::Warning,
                        format!("Column '{}' is empty", column),
                    )
                    .on(column),
                );
                continue;
            }
            if column == YEAR_COLUMN
                || column == MONTH_COLUMN
                || self.config.key_columns.contains(column)
            {
                continue;
            }

            let numbers: Vec<f64> = present.iter().filter_map(|v| parse_number(v)).collect();
            let share = numbers.len() as f64 / present.len() as f64;
            if share < NUMERIC_SHARE {
                // Mostly numeric columns with a few bad cells are worth a flag
                if share >= 0.5 {
                    issues.push(
                        QualityIssue::new(
                            QualityIssueType::InvalidFormat,
                            QualitySeverity::Info,
                            format!(
                                "Column '{}' has {} non-numeric values",
                                column,
                                present.len() - numbers.len()
                            ),
                        )
                        .on(column),
                    );
                }
                continue;
            }

            if let Some((low, high)) = iqr_fences(&numbers, self.config.outlier_iqr_factor) {
                let outliers = numbers.iter().filter(|&&v| v < low || v > high).count();
                if outliers > 0 {
                    let ratio = outliers as f64 / numbers.len() as f64;
                    let severity = if ratio > self.config.max_outlier_ratio {
                        QualitySeverity::Warning
                    } else {
                        QualitySeverity::Info
                    };
                    issues.push(
                        QualityIssue::new(
                            QualityIssueType::SuspiciousValue,
                            severity,
                            format!(
                                "{} values outside [{:.2}, {:.2}] in '{}'",
                                outliers, low, high, column
                            ),
                        )
                        .on(column)
                        .suggest("Confirm with a domain expert before removing"),
                    );
                }
            }
        }

        issues
    }

    /// Calculate overall quality score based on issues
    fn calculate_quality_score(&self, issues: &[QualityIssue]) -> f64 {
        let mut score: f64 = 1.0;

        for issue in issues {
            let deduction = match issue.severity {
                QualitySeverity::Info => 0.01,
                QualitySeverity::Warning => 0.05,
                QualitySeverity::Error => 0.15,
                QualitySeverity::Critical => 0.30,
            };
            score = (score - deduction).max(0.0);
        }

        score
    }

    /// Determine quality decision based on score and issues
    fn determine_decision(&self, quality_score: f64, issues: &[QualityIssue]) -> QualityDecision {
        if issues.iter().any(|i| i.severity == QualitySeverity::Critical) {
            return QualityDecision::Quarantine;
        }

        if quality_score < self.config.min_quality_score {
            return QualityDecision::Quarantine;
        }

        if issues.iter().any(|i| i.severity >= QualitySeverity::Warning) {
            return QualityDecision::AcceptWithWarnings;
        }

        QualityDecision::Accept
    }
}

impl Default for DefaultQualityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityGate for DefaultQualityGate {
    fn assess(&self, file: &str, table: &Table) -> QualityAssessment {
        let mut issues = Vec::new();

        if table.rows.is_empty() {
            issues.push(QualityIssue::new(
                QualityIssueType::MissingData,
                QualitySeverity::Critical,
                "Table has no data rows".to_string(),
            ));
        } else {
            issues.extend(self.assess_time_key(table));
            issues.extend(self.assess_rows(table));
            issues.extend(self.assess_columns(table));
        }

        let quality_score = self.calculate_quality_score(&issues);
        let decision = self.determine_decision(quality_score, &issues);

        QualityAssessment {
            file: file.to_string(),
            decision,
            quality_score,
            issues,
            rule_version: self.config.rule_version.clone(),
            assessed_at: Utc::now(),
        }
    }
}

/// Aggregate statistics over a batch of assessments
#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityGateBatchStats {
    pub total_files: usize,
    pub accepted_count: usize,
    pub accepted_with_warnings_count: usize,
    pub quarantined_count: usize,
    pub unreadable_count: usize,
    pub min_quality_score: Option<f64>,
    pub max_quality_score: Option<f64>,
    pub avg_quality_score: f64,
    pub info_issues: usize,
    pub warning_issues: usize,
    pub error_issues: usize,
    pub critical_issues: usize,
}

impl QualityGateBatchStats {
    pub fn from_assessments(assessments: &[QualityAssessment]) -> Self {
        let mut stats = Self::default();

        for assessment in assessments {
            stats.total_files += 1;
            match assessment.decision {
                QualityDecision::Accept => stats.accepted_count += 1,
                QualityDecision::AcceptWithWarnings => stats.accepted_with_warnings_count += 1,
                QualityDecision::Quarantine => stats.quarantined_count += 1,
            }

            let score = assessment.quality_score;
            stats.min_quality_score = Some(stats.min_quality_score.map_or(score, |s| s.min(score)));
            stats.max_quality_score = Some(stats.max_quality_score.map_or(score, |s| s.max(score)));
            stats.avg_quality_score +=
                (score - stats.avg_quality_score) / stats.total_files as f64;

            for issue in &assessment.issues {
                match issue.severity {
                    QualitySeverity::Info => stats.info_issues += 1,
                    QualitySeverity::Warning => stats.warning_issues += 1,
                    QualitySeverity::Error => stats.error_issues += 1,
                    QualitySeverity::Critical => stats.critical_issues += 1,
                }
            }
        }

        stats
    }
}

/// JSON report written by the `quality` command
#[derive(Debug, Serialize)]
pub struct QualityReport {
    pub generated_at: DateTime<Utc>,
    pub stats: QualityGateBatchStats,
    pub assessments: Vec<QualityAssessment>,
    pub unreadable: Vec<String>,
}

/// Assess every CSV below `root`
#[instrument(skip_all, fields(root = %root.display()))]
pub fn assess_directory(root: &Path, gate: &dyn QualityGate) -> Result<QualityReport> {
    let mut assessments = Vec::new();
    let mut unreadable = Vec::new();

    for path in table::csv_files_recursive(root)? {
        let label = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        match table::read_table(&path, DetectionStrategy::FirstMatch) {
            Ok(t) => {
                let assessment = gate.assess(&label, &t);
                metrics::counter!("prep_quality_decisions_total", "decision" => format!("{:?}", assessment.decision))
                    .increment(1);
                assessments.push(assessment);
            }
            Err(e) => unreadable.push(format!("{}: {}", label, e)),
        }
    }

    let mut stats = QualityGateBatchStats::from_assessments(&assessments);
    stats.unreadable_count = unreadable.len();
    info!(
        accepted = stats.accepted_count,
        warnings = stats.accepted_with_warnings_count,
        quarantined = stats.quarantined_count,
        "Quality assessment finished"
    );

    Ok(QualityReport {
        generated_at: Utc::now(),
        stats,
        assessments,
        unreadable,
    })
}
