/// Shared constants for column detection and on-disk naming.
/// Keyword lists are matched against normalized column names (whitespace
/// removed, lowercased).

pub const YEAR_COLUMN: &str = "year";
pub const MONTH_COLUMN: &str = "month";

// Plausible calendar years for date values
pub const YEAR_MIN: i64 = 1900;
pub const YEAR_MAX: i64 = 2100;

// Names that mark an explicit year / month column
pub const YEAR_KEYWORDS: [&str; 3] = ["year", "년도", "연도"];
pub const MONTH_KEYWORDS: [&str; 2] = ["month", "월"];
pub const YEAR_SUFFIX: &str = "년도";
pub const MONTH_ALIAS: &str = "기준월";

/// Hints that a column may hold a combined YYYYMM(DD) value
pub const DATE_COLUMN_HINTS: [&str; 8] = ["년", "월", "일", "date", "날짜", "기준", "period", "기간"];

/// Keywords that mark a column as redundant once year/month exist
pub const CLEANUP_DATE_KEYWORDS: [&str; 9] =
    ["년", "월", "일", "date", "날짜", "일자", "기간", "기준", "period"];

// Columns read by the coverage scan
pub const COVERAGE_YEAR_COLUMN: &str = "년도";
pub const COVERAGE_MONTH_COLUMN: &str = "월";

pub const DEFAULT_MAX_INDEX: u32 = 7;
pub const DEFAULT_BASE_START: u32 = 202001;
pub const DEFAULT_BASE_END: u32 = 202509;
pub const DEFAULT_MAX_SEGMENTS: usize = 6;
pub const DEFAULT_SAMPLE_LIMIT: usize = 1000;

pub const PROFILE_FILE_NAME: &str = "data_profile_summary.json";
pub const COVERAGE_RESULT_DIR: &str = "result";
pub const COVERAGE_CSV_NAME: &str = "기간누락_요약.csv";
pub const COVERAGE_MD_NAME: &str = "기간누락_요약.md";

pub const NOTE_NO_PERIOD: &str = "기간 정보 확인 불가";
pub const SEGMENT_ELLIPSIS: &str = "…";

/// Environment variable that overrides the configured data root
pub const DATA_ROOT_ENV: &str = "TOURISM_PREP_DATA_ROOT";

/// Normalize a column name for keyword matching
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
