use super::detect::{detect_date_columns, extract_year_month, DateColumns};
use crate::constants::{MONTH_COLUMN, YEAR_COLUMN};
use crate::error::Result;
use crate::table::{self, parse_integer, DetectionStrategy, Table};
use crate::types::parse_period_prefix;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, instrument};

/// What the normalizer decided for one file
#[derive(Debug, Clone, Serialize)]
pub struct NormalizeReport {
    pub file: String,
    pub encoding: String,
    pub columns: DateColumns,
    pub used_file_name_fallback: bool,
    pub missing_year_rows: usize,
    pub missing_month_rows: usize,
}

fn to_cells(values: &[Option<i64>]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.map(|n| n.to_string()).unwrap_or_default())
        .collect()
}

/// Add leading `year` and `month` columns to a table.
///
/// Sources in priority order: explicit year/month columns, a combined date
/// column for whichever is still missing, then the period in the file name.
/// Returns the rewritten table and the report.
pub fn normalize_table(table: &Table, file_name: &str) -> (Table, NormalizeReport) {
    let info = detect_date_columns(table);
    let rows = table.rows.len();

    let mut related: Vec<String> = Vec::new();
    let mut years: Option<Vec<Option<i64>>> = None;
    let mut months: Option<Vec<Option<i64>>> = None;

    if let Some(col) = &info.year_col {
        if let Some(idx) = table.column_index(col) {
            years = Some(table.column(idx).map(parse_integer).collect());
            related.push(col.clone());
        }
    }
    if let Some(col) = &info.month_col {
        if let Some(idx) = table.column_index(col) {
            months = Some(table.column(idx).map(parse_integer).collect());
            related.push(col.clone());
        }
    }

    if years.is_none() || months.is_none() {
        if let Some(col) = &info.combined_col {
            if let Some(idx) = table.column_index(col) {
                let (combined_years, combined_months): (Vec<_>, Vec<_>) =
                    table.column(idx).map(extract_year_month).unzip();
                related.push(col.clone());
                years.get_or_insert(combined_years);
                months.get_or_insert(combined_months);
            }
        }
    }

    let mut used_fallback = false;
    let (fallback_year, fallback_month) = match parse_period_prefix(file_name) {
        Some((start, _)) => (Some((start / 100) as i64), Some((start % 100) as i64)),
        None => (None, None),
    };
    let years = years.unwrap_or_else(|| {
        used_fallback |= fallback_year.is_some();
        vec![fallback_year; rows]
    });
    let months = months.unwrap_or_else(|| {
        used_fallback |= fallback_month.is_some();
        vec![fallback_month; rows]
    });

    let report = NormalizeReport {
        file: file_name.to_string(),
        encoding: table.encoding.label().to_string(),
        columns: info,
        used_file_name_fallback: used_fallback,
        missing_year_rows: years.iter().filter(|v| v.is_none()).count(),
        missing_month_rows: months.iter().filter(|v| v.is_none()).count(),
    };

    let mut working = table.clone();
    working.set_column(YEAR_COLUMN, to_cells(&years));
    working.set_column(MONTH_COLUMN, to_cells(&months));

    let mut order = vec![YEAR_COLUMN.to_string(), MONTH_COLUMN.to_string()];
    for column in related.into_iter().chain(working.headers.iter().cloned()) {
        if !order.contains(&column) {
            order.push(column);
        }
    }

    (working.select(&order), report)
}

/// Normalize a CSV file in place
#[instrument(skip_all, fields(path = %path.display()))]
pub fn normalize_file(path: &Path) -> Result<NormalizeReport> {
    let table = table::read_table(path, DetectionStrategy::HeaderScore)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (normalized, report) = normalize_table(&table, &file_name);
    table::write_table(path, &normalized)?;
    debug!(?report.columns, "normalized date columns");
    Ok(report)
}
