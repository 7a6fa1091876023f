use crate::constants::{YEAR_MAX, YEAR_MIN};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static PERIOD_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<start>\d{6})-(?P<end>\d{6})_").expect("valid period regex"));

/// A calendar month, the unit of the `target_month` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Build a month, rejecting months outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Build a month from integer cells. Years outside 1900..=2100 are
    /// treated as typos and rejected.
    pub fn from_cells(year: i64, month: i64) -> Option<Self> {
        if !(YEAR_MIN..=YEAR_MAX).contains(&year) {
            return None;
        }
        Self::new(i32::try_from(year).ok()?, u32::try_from(month).ok()?)
    }

    /// Decode a `YYYYMM` key such as `202001`
    pub fn from_key(key: u32) -> Option<Self> {
        Self::new((key / 100) as i32, key % 100)
    }

    /// The `YYYYMM` integer key
    pub fn key(&self) -> u32 {
        self.year as u32 * 100 + self.month
    }

    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// Signed number of months from `self` to `other`
    pub fn months_until(&self, other: &YearMonth) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }

    /// Label in `YYYY-MM` form
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Inclusive month range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl MonthRange {
    pub fn new(start: YearMonth, end: YearMonth) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, month: &YearMonth) -> bool {
        *month >= self.start && *month <= self.end
    }

    /// Every month from start to end, empty when start > end
    pub fn months(&self) -> Vec<YearMonth> {
        let mut months = Vec::new();
        let mut current = self.start;
        while current <= self.end {
            months.push(current);
            current = current.succ();
        }
        months
    }

    pub fn len(&self) -> usize {
        (self.start.months_until(&self.end) + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Period encoded in a file or folder name prefix, e.g. `202001-202012_방문자.csv`.
/// Either bound may not be a valid month; callers decide what they need.
pub fn parse_period_prefix(name: &str) -> Option<(u32, u32)> {
    let caps = PERIOD_PREFIX.captures(name)?;
    let start = caps.name("start")?.as_str().parse().ok()?;
    let end = caps.name("end")?.as_str().parse().ok()?;
    Some((start, end))
}
