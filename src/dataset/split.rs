use super::SplitRatios;
use crate::error::{PrepError, Result};
use crate::types::{MonthRange, YearMonth};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// Guards against 30 * 0.7 = 20.999...
const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Valid,
    Test,
}

/// Month ranges of each split, echoed in the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitBoundaries {
    pub train: Option<MonthRange>,
    pub valid: Option<MonthRange>,
    pub test: Option<MonthRange>,
}

/// Chronological split over the sorted unique months of a panel. The
/// boundaries are months, so every month belongs to exactly one split.
#[derive(Debug, Clone)]
pub struct ChronoSplit {
    pub months: Vec<YearMonth>,
    train_end: usize,
    valid_end: usize,
}

fn share(n: usize, ratio: f64) -> usize {
    ((n as f64 * ratio) + RATIO_EPSILON).floor() as usize
}

impl ChronoSplit {
    pub fn from_months(months: BTreeSet<YearMonth>, ratios: SplitRatios) -> Result<Self> {
        if months.is_empty() {
            return Err(PrepError::Config("dataset input has no valid year/month rows".to_string()));
        }
        let months: Vec<YearMonth> = months.into_iter().collect();
        let n = months.len();
        let train_end = share(n, ratios.train).clamp(1, n);
        let valid_end = (train_end + share(n, ratios.valid)).min(n);
        Ok(Self {
            months,
            train_end,
            valid_end,
        })
    }

    pub fn split_of(&self, month: &YearMonth) -> Option<Split> {
        let position = self.months.binary_search(month).ok()?;
        Some(if position < self.train_end {
            Split::Train
        } else if position < self.valid_end {
            Split::Valid
        } else {
            Split::Test
        })
    }

    fn range(&self, from: usize, to: usize) -> Option<MonthRange> {
        (from < to).then(|| MonthRange::new(self.months[from], self.months[to - 1]))
    }

    pub fn boundaries(&self) -> SplitBoundaries {
        SplitBoundaries {
            train: self.range(0, self.train_end),
            valid: self.range(self.train_end, self.valid_end),
            test: self.range(self.valid_end, self.months.len()),
        }
    }
}
