//! Missing-period check: which months of a base period each export covers.

mod report;

pub use report::{render_markdown, write_reports, CoverageReportPaths};

use crate::constants::{
    COVERAGE_MONTH_COLUMN, COVERAGE_YEAR_COLUMN, NOTE_NO_PERIOD, SEGMENT_ELLIPSIS,
};
use crate::error::{PrepError, Result};
use crate::table::{self, parse_integer, DetectionStrategy, Table};
use crate::types::{parse_period_prefix, MonthRange, YearMonth};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, instrument, warn};

static DATE_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"(20\d{2})[-./]?(0[1-9]|1[0-2])").expect("valid date regex"),
        Regex::new(r"(20\d{2})\D(1[0-2]|0?[1-9])").expect("valid date regex"),
    ]
});

// Years accepted as plausible data months
const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2030;

/// Coverage of one file against the base period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_name: String,
    pub folder: String,
    pub data_range: String,
    pub present_count: usize,
    pub missing_count: usize,
    pub missing_ranges: String,
    pub notes: String,
}

fn plausible(year: i64, month: i64) -> Option<YearMonth> {
    if !(MIN_YEAR as i64..=MAX_YEAR as i64).contains(&year) {
        return None;
    }
    YearMonth::new(year as i32, u32::try_from(month).ok()?)
}

/// Every month mentioned in a table: `년도` + `월` row pairs, plus any
/// date-like text in any cell.
pub fn extract_year_months(table: &Table) -> BTreeSet<YearMonth> {
    let mut months = BTreeSet::new();

    if let (Some(y), Some(m)) = (
        table.column_index(COVERAGE_YEAR_COLUMN),
        table.column_index(COVERAGE_MONTH_COLUMN),
    ) {
        for row in &table.rows {
            if let (Some(year), Some(month)) = (parse_integer(&row[y]), parse_integer(&row[m])) {
                months.extend(plausible(year, month));
            }
        }
    }

    for row in &table.rows {
        for value in row.iter().filter(|v| !table::is_missing(v)) {
            for pattern in DATE_PATTERNS.iter() {
                for caps in pattern.captures_iter(value) {
                    let year = caps[1].parse::<i64>().unwrap_or_default();
                    let month = caps[2].parse::<i64>().unwrap_or_default();
                    months.extend(plausible(year, month));
                }
            }
        }
    }

    months
}

/// Compress months into `YYYY-MM~YYYY-MM` runs, keeping at most `max_segments`
pub fn months_to_ranges(months: &BTreeSet<YearMonth>, max_segments: usize) -> String {
    let mut segments: Vec<(YearMonth, YearMonth)> = Vec::new();
    for &month in months {
        match segments.last_mut() {
            Some((_, end)) if end.succ() == month => *end = month,
            _ => segments.push((month, month)),
        }
    }

    let mut labels: Vec<String> = segments
        .iter()
        .take(max_segments)
        .map(|(start, end)| {
            if start == end {
                start.label()
            } else {
                format!("{}~{}", start.label(), end.label())
            }
        })
        .collect();
    if segments.len() > max_segments {
        labels.push(SEGMENT_ELLIPSIS.to_string());
    }
    labels.join(", ")
}

/// Summarize the months found in a table against the base period
pub fn summarize_months(
    file_name: &str,
    folder: &str,
    found: &BTreeSet<YearMonth>,
    base: &MonthRange,
    max_segments: usize,
) -> FileSummary {
    let base_months: BTreeSet<YearMonth> = base.months().into_iter().collect();
    let present: BTreeSet<YearMonth> = found.intersection(&base_months).copied().collect();
    let missing: BTreeSet<YearMonth> = base_months.difference(&present).copied().collect();
    let outside: Vec<YearMonth> = found.iter().filter(|m| !base.contains(m)).copied().collect();

    let mut data_range = match (found.first(), found.last()) {
        (Some(first), Some(last)) => format!("{}~{}", first.label(), last.label()),
        _ => String::new(),
    };
    if data_range.is_empty() {
        let named = parse_period_prefix(file_name)
            .and_then(|(start, end)| Some((YearMonth::from_key(start)?, YearMonth::from_key(end)?)));
        if let Some((start, end)) = named {
            data_range = format!("{}~{}", start.label(), end.label());
        }
    }

    let mut notes = Vec::new();
    if found.is_empty() {
        notes.push(NOTE_NO_PERIOD.to_string());
    }
    if let Some(first_outside) = outside.first() {
        notes.push(format!(
            "기준 외 {}개월 (예: {})",
            outside.len(),
            first_outside.label()
        ));
    }

    FileSummary {
        file_name: file_name.to_string(),
        folder: folder.to_string(),
        data_range,
        present_count: present.len(),
        missing_count: missing.len(),
        missing_ranges: months_to_ranges(&missing, max_segments),
        notes: notes.join(", "),
    }
}

/// Summarize one CSV file. Read failures become a summary, not an error.
pub fn summarize_file(path: &Path, base: &MonthRange, max_segments: usize) -> FileSummary {
    let file_name = crate::layout::file_name(path);
    let folder = path
        .parent()
        .map(crate::layout::file_name)
        .unwrap_or_default();

    match table::read_table(path, DetectionStrategy::FirstMatch) {
        Ok(table) => {
            let found = extract_year_months(&table);
            summarize_months(&file_name, &folder, &found, base, max_segments)
        }
        Err(e) => {
            warn!(path = %path.display(), "Failed to read file: {}", e);
            FileSummary {
                file_name,
                folder,
                data_range: String::new(),
                present_count: 0,
                missing_count: base.len(),
                missing_ranges: String::new(),
                notes: format!("read_error:{}", e),
            }
        }
    }
}

/// Summarize every CSV directly inside `dir`
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn summarize_directory(dir: &Path, base: &MonthRange, max_segments: usize) -> Result<Vec<FileSummary>> {
    if !dir.exists() {
        return Err(PrepError::MissingDirectory(dir.to_path_buf()));
    }
    let summaries: Vec<FileSummary> = table::csv_files_in(dir)?
        .iter()
        .map(|path| summarize_file(path, base, max_segments))
        .collect();
    info!("Summarized {} files", summaries.len());
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SourceEncoding;

    fn base() -> MonthRange {
        MonthRange::new(
            YearMonth::from_key(202001).unwrap(),
            YearMonth::from_key(202509).unwrap(),
        )
    }

    fn ym(key: u32) -> YearMonth {
        YearMonth::from_key(key).unwrap()
    }

    #[test]
    fn test_extracts_from_columns_and_text() {
        let table = Table::parse(
            "년도,월,비고\n2020,1,\n2031,2,\n2020,3,집계 2021.11 기준\n",
            SourceEncoding::Utf8,
        )
        .unwrap();
        let months = extract_year_months(&table);
        assert!(months.contains(&ym(202001)));
        assert!(months.contains(&ym(202003)));
        assert!(months.contains(&ym(202111)));
        assert!(!months.iter().any(|m| m.year == 2031));
    }

    #[test]
    fn test_compact_stamps_are_found() {
        let table = Table::parse("기준년월,값\n202312,1\n2024-01,2\n", SourceEncoding::Utf8).unwrap();
        let months = extract_year_months(&table);
        assert_eq!(months.into_iter().collect::<Vec<_>>(), vec![ym(202312), ym(202401)]);
    }

    #[test]
    fn test_months_to_ranges_truncates() {
        let months: BTreeSet<YearMonth> = [201912, 202001, 202002, 202005]
            .into_iter()
            .map(ym)
            .collect();
        assert_eq!(months_to_ranges(&months, 6), "2019-12~2020-02, 2020-05");
        assert_eq!(months_to_ranges(&months, 1), "2019-12~2020-02, …");
        assert_eq!(months_to_ranges(&BTreeSet::new(), 6), "");
    }

    #[test]
    fn test_summary_counts_and_notes() {
        let found: BTreeSet<YearMonth> = [201912, 202001, 202002].into_iter().map(ym).collect();
        let summary = summarize_months("a.csv", "내외국인", &found, &base(), 6);
        assert_eq!(summary.present_count, 2);
        assert_eq!(summary.missing_count, 67);
        assert_eq!(summary.data_range, "2019-12~2020-02");
        assert_eq!(summary.missing_ranges, "2020-03~2025-09");
        assert_eq!(summary.notes, "기준 외 1개월 (예: 2019-12)");
    }

    #[test]
    fn test_empty_file_uses_name_period() {
        let summary = summarize_months("202101-202112_x.csv", "d", &BTreeSet::new(), &base(), 6);
        assert_eq!(summary.data_range, "2021-01~2021-12");
        assert_eq!(summary.missing_count, 69);
        assert_eq!(summary.notes, NOTE_NO_PERIOD);
    }
}
