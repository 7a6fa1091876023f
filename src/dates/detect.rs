use crate::constants::{
    normalize_column_name, DATE_COLUMN_HINTS, MONTH_ALIAS, MONTH_KEYWORDS, YEAR_KEYWORDS, YEAR_MAX, YEAR_MIN,
    YEAR_SUFFIX,
};
use crate::table::{digits_only, Table};
use serde::Serialize;

const EXPLICIT_THRESHOLD: f64 = 0.8;
const COMBINED_THRESHOLD: f64 = 0.6;

/// Columns that carry date information in a table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateColumns {
    pub year_col: Option<String>,
    pub month_col: Option<String>,
    pub combined_col: Option<String>,
}

/// Share of values satisfying `pred`; None when there are no values
fn share<'a>(values: impl IntoIterator<Item = &'a str>, pred: impl Fn(&str) -> bool) -> Option<f64> {
    let mut total = 0usize;
    let mut hits = 0usize;
    for value in values {
        total += 1;
        if pred(value) {
            hits += 1;
        }
    }
    (total > 0).then(|| hits as f64 / total as f64)
}

fn digits_in_range(value: &str, lo: u64, hi: u64) -> bool {
    digits_only(value)
        .parse::<u64>()
        .map(|n| (lo..=hi).contains(&n))
        .unwrap_or(false)
}

/// At least 80% of the present values look like years (1900..=2100)
pub fn is_year_series(values: &[&str]) -> bool {
    share(values.iter().copied(), |v| digits_in_range(v, YEAR_MIN as u64, YEAR_MAX as u64))
        .map_or(false, |s| s >= EXPLICIT_THRESHOLD)
}

/// At least 80% of the present values look like months (1..=12)
pub fn is_month_series(values: &[&str]) -> bool {
    share(values.iter().copied(), |v| digits_in_range(v, 1, 12))
        .map_or(false, |s| s >= EXPLICIT_THRESHOLD)
}

/// Whether present values look like `YYYYMM` or `YYYYMMDD` stamps
pub fn is_combined_series(values: &[&str]) -> bool {
    let digits: Vec<String> = values.iter().map(|v| digits_only(v)).collect();
    if digits.is_empty() {
        return false;
    }

    let length_ok = share(digits.iter().map(String::as_str), |d| (6..=8).contains(&d.len()))
        .unwrap_or(0.0);
    if length_ok < COMBINED_THRESHOLD {
        return false;
    }

    let prefix_ok = share(digits.iter().map(String::as_str), |d| {
        d.len() >= 6
            && d[..6].parse::<u32>().is_ok()
            && d[4..6].parse::<u32>().map_or(false, |m| (1..=12).contains(&m))
    })
    .unwrap_or(0.0);
    prefix_ok >= COMBINED_THRESHOLD
}

fn is_year_name(normalized: &str) -> bool {
    YEAR_KEYWORDS.contains(&normalized) || normalized.ends_with(YEAR_SUFFIX)
}

fn is_month_name(normalized: &str) -> bool {
    MONTH_KEYWORDS.contains(&normalized) || normalized == MONTH_ALIAS
}

/// Find year, month and combined date columns.
///
/// Explicit year/month columns are matched by name and confirmed by content.
/// The combined column is only searched for when one of them is missing.
pub fn detect_date_columns(table: &Table) -> DateColumns {
    let mut info = DateColumns::default();

    for (index, column) in table.headers.iter().enumerate() {
        let normalized = normalize_column_name(column);
        if info.year_col.is_none() && is_year_name(&normalized) {
            if is_year_series(&table.present_values(index)) {
                info.year_col = Some(column.clone());
                continue;
            }
        }
        if info.month_col.is_none() && is_month_name(&normalized) {
            if is_month_series(&table.present_values(index)) {
                info.month_col = Some(column.clone());
                continue;
            }
        }
    }

    if info.year_col.is_none() || info.month_col.is_none() {
        info.combined_col = table
            .headers
            .iter()
            .enumerate()
            .find(|(index, column)| {
                let normalized = normalize_column_name(column);
                DATE_COLUMN_HINTS.iter().any(|hint| normalized.contains(hint))
                    && is_combined_series(&table.present_values(*index))
            })
            .map(|(_, column)| column.clone());
    }

    info
}

/// Year and month from a combined stamp such as `2020-01`, `202001` or `20200115`
pub fn extract_year_month(value: &str) -> (Option<i64>, Option<i64>) {
    let digits = digits_only(value);
    let year = digits.get(..4).and_then(|d| d.parse::<i64>().ok());
    let month = digits.get(4..6).and_then(|d| d.parse::<i64>().ok());
    match (year, month) {
        (Some(y), Some(m)) if (YEAR_MIN..=YEAR_MAX).contains(&y) && (1..=12).contains(&m) => (Some(y), Some(m)),
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SourceEncoding;

    fn table(text: &str) -> Table {
        Table::parse(text, SourceEncoding::Utf8).unwrap()
    }

    #[test]
    fn test_explicit_year_and_month_columns() {
        let t = table("년도,월,방문자\n2020,1,5\n2020,2,6\n");
        let info = detect_date_columns(&t);
        assert_eq!(info.year_col.as_deref(), Some("년도"));
        assert_eq!(info.month_col.as_deref(), Some("월"));
        assert_eq!(info.combined_col, None);
    }

    #[test]
    fn test_year_name_with_bad_content_is_ignored() {
        let t = table("year,value\nabc,1\n12,2\n");
        assert_eq!(detect_date_columns(&t).year_col, None);
    }

    #[test]
    fn test_combined_column_found_by_hint() {
        let t = table("지역,기준년월,값\n서울,2020-01,1\n부산,2020-02,2\n");
        let info = detect_date_columns(&t);
        assert_eq!(info.combined_col.as_deref(), Some("기준년월"));
    }

    #[test]
    fn test_combined_search_skipped_when_both_present() {
        let t = table("year,month,기준일자\n2020,1,20200101\n");
        assert_eq!(detect_date_columns(&t).combined_col, None);
    }

    #[test]
    fn test_extract_year_month() {
        assert_eq!(extract_year_month("2020-03"), (Some(2020), Some(3)));
        assert_eq!(extract_year_month("20201231"), (Some(2020), Some(12)));
        assert_eq!(extract_year_month("202013"), (None, None));
        assert_eq!(extract_year_month("2020"), (None, None));
    }

    #[test]
    fn test_series_thresholds() {
        assert!(is_year_series(&["2020", "2021", "2022", "2023", "x"]));
        assert!(!is_year_series(&["2020", "x", "y"]));
        assert!(!is_month_series(&[]));
        assert!(is_combined_series(&["202001", "202002", "2020"]));
        assert!(!is_combined_series(&["2020", "2021", "202001"]));
    }
}
