use crate::constants::{normalize_column_name, CLEANUP_DATE_KEYWORDS, MONTH_COLUMN, YEAR_COLUMN};
use crate::error::Result;
use crate::table::{self, DetectionStrategy, Table};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub file: String,
    pub dropped: Vec<String>,
}

/// Whether a column is a redundant date column once `year`/`month` exist
pub fn should_drop(column: &str) -> bool {
    let normalized = normalize_column_name(column);
    if normalized == YEAR_COLUMN || normalized == MONTH_COLUMN {
        return false;
    }
    CLEANUP_DATE_KEYWORDS.iter().any(|keyword| normalized.contains(keyword))
}

/// Drop date columns and move `year`, `month` to the front
pub fn cleanup_table(table: &Table) -> (Table, Vec<String>) {
    let (dropped, kept): (Vec<String>, Vec<String>) =
        table.headers.iter().cloned().partition(|c| should_drop(c));

    let mut order: Vec<String> = kept
        .iter()
        .filter(|c| c.as_str() == YEAR_COLUMN || c.as_str() == MONTH_COLUMN)
        .cloned()
        .collect();
    order.extend(
        kept.into_iter()
            .filter(|c| c != YEAR_COLUMN && c != MONTH_COLUMN),
    );

    (table.select(&order), dropped)
}

/// Clean a CSV file in place
pub fn cleanup_file(path: &Path) -> Result<CleanupReport> {
    let table = table::read_table(path, DetectionStrategy::FirstMatch)?;
    let (cleaned, dropped) = cleanup_table(&table);
    table::write_table(path, &cleaned)?;
    Ok(CleanupReport {
        file: path.display().to_string(),
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SourceEncoding;

    #[test]
    fn test_should_drop() {
        assert!(should_drop("기준년월"));
        assert!(should_drop("Base Date"));
        assert!(!should_drop("year"));
        assert!(!should_drop(" Month"));
        assert!(!should_drop("방문자수"));
    }

    #[test]
    fn test_cleanup_reorders_and_drops() {
        let table = Table::parse("지역,month,기준년월,year,방문자수\n서울,1,202001,2020,5\n", SourceEncoding::Utf8).unwrap();
        let (cleaned, dropped) = cleanup_table(&table);
        assert_eq!(dropped, vec!["기준년월"]);
        assert_eq!(cleaned.headers, vec!["month", "year", "지역", "방문자수"]);
        assert_eq!(cleaned.rows[0], vec!["1", "2020", "서울", "5"]);
    }

    #[test]
    fn test_repeated_value_columns_keep_their_own_data() {
        let table = Table::parse("년도,월,값,값,year,month\n2020,1,10,99,2020,1\n", SourceEncoding::Utf8).unwrap();
        let (cleaned, dropped) = cleanup_table(&table);
        assert_eq!(dropped, vec!["년도", "월"]);
        assert_eq!(cleaned.headers, vec!["year", "month", "값", "값.1"]);
        assert_eq!(cleaned.rows[0], vec!["2020", "1", "10", "99"]);
    }
}
