use super::{ChronoSplit, Panel, Scaler, Split};
use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One training example: `window` consecutive months of scaled inputs and
/// the target `horizon` months after the last input month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub group: BTreeMap<String, String>,
    /// `YYYYMM` keys
    pub start_month: u32,
    pub end_month: u32,
    pub target_month: u32,
    /// `inputs[t][f]`, features in the order listed in the manifest
    pub inputs: Vec<Vec<f64>>,
    pub target: f64,
    pub target_raw: f64,
}

#[derive(Debug, Clone, Default)]
pub struct WindowSet {
    pub train: Vec<WindowRecord>,
    pub valid: Vec<WindowRecord>,
    pub test: Vec<WindowRecord>,
    /// Candidate windows dropped for missing inputs or target
    pub dropped: usize,
}

/// Slide a window over every group. A window lands in the split of its
/// target month.
pub fn build_windows(
    panel: &Panel,
    scaler: &Scaler,
    split: &ChronoSplit,
    inputs: &[String],
    target: &str,
    window: usize,
    horizon: usize,
) -> Result<WindowSet> {
    let input_indices = inputs
        .iter()
        .map(|c| panel.column_index(c).ok_or_else(|| PrepError::MissingColumn(c.clone())))
        .collect::<Result<Vec<_>>>()?;
    let target_index = panel
        .column_index(target)
        .ok_or_else(|| PrepError::MissingColumn(target.to_string()))?;

    let mut set = WindowSet::default();

    for series in &panel.series {
        let group: BTreeMap<String, String> = panel
            .group_keys
            .iter()
            .cloned()
            .zip(series.key.iter().cloned())
            .collect();

        let span = window + horizon;
        if series.months.len() < span {
            continue;
        }

        for start in 0..=series.months.len() - span {
            let end = start + window - 1;
            let target_at = end + horizon;

            let rows: Option<Vec<Vec<f64>>> = series.values[start..=end]
                .iter()
                .map(|row| {
                    input_indices
                        .iter()
                        .map(|&i| row[i].map(|v| scaler.transform(i, v)))
                        .collect::<Option<Vec<f64>>>()
                })
                .collect();
            let (Some(rows), Some(target_raw)) = (rows, series.values[target_at][target_index]) else {
                set.dropped += 1;
                continue;
            };

            let target_month = series.months[target_at];
            let record = WindowRecord {
                group: group.clone(),
                start_month: series.months[start].key(),
                end_month: series.months[end].key(),
                target_month: target_month.key(),
                inputs: rows,
                target: scaler.transform(target_index, target_raw),
                target_raw,
            };

            match split.split_of(&target_month) {
                Some(Split::Train) => set.train.push(record),
                Some(Split::Valid) => set.valid.push(record),
                Some(Split::Test) => set.test.push(record),
                None => set.dropped += 1,
            }
        }
    }

    Ok(set)
}

/// Serialize records one JSON object per line
pub fn to_jsonl(records: &[WindowRecord]) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for record in records {
        serde_json::to_writer(&mut bytes, record)?;
        bytes.push(b'\n');
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ScalerKind, SplitRatios};
    use crate::table::{SourceEncoding, Table};

    fn setup(text: &str) -> (Panel, Scaler, ChronoSplit) {
        let table = Table::parse(text, SourceEncoding::Utf8).unwrap();
        let panel = Panel::from_table(&table, &["region_id".to_string()], &["visitors".to_string()]).unwrap();
        let split = ChronoSplit::from_months(panel.months(), SplitRatios { train: 1.0, valid: 0.0 }).unwrap();
        let scaler = Scaler::fit(ScalerKind::None, &panel, &split).unwrap();
        (panel, scaler, split)
    }

    #[test]
    fn test_windows_skip_gaps() {
        // April is resampled but empty
        let (panel, scaler, split) = setup(
            "year,month,region_id,visitors\n2020,1,11,1\n2020,2,11,2\n2020,3,11,3\n2020,5,11,5\n2020,6,11,6\n",
        );
        let set = build_windows(&panel, &scaler, &split, &["visitors".to_string()], "visitors", 2, 1).unwrap();

        // candidates start at Jan..Apr; Feb, Mar and Apr touch the gap
        assert_eq!(set.train.len(), 1);
        assert_eq!(set.dropped, 3);
        let record = &set.train[0];
        assert_eq!(record.group["region_id"], "11");
        assert_eq!((record.start_month, record.end_month, record.target_month), (202001, 202002, 202003));
        assert_eq!(record.inputs, vec![vec![1.0], vec![2.0]]);
        assert_eq!(record.target, 3.0);
    }

    #[test]
    fn test_jsonl_has_one_line_per_record() {
        let (panel, scaler, split) = setup("year,month,region_id,visitors\n2020,1,11,1\n2020,2,11,2\n2020,3,11,3\n");
        let set = build_windows(&panel, &scaler, &split, &["visitors".to_string()], "visitors", 1, 1).unwrap();
        let text = String::from_utf8(to_jsonl(&set.train).unwrap()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| l.starts_with("{\"group\"")));
    }
}
