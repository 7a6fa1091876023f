//! Lag and lead columns, computed within each group so values never leak
//! across panel keys.

use super::Panel;
use crate::error::{PrepError, Result};

/// Value of `values` shifted by `offset` positions; positive offsets look
/// back (lags), negative ones look ahead (leads)
pub fn shift(values: &[Option<f64>], offset: isize) -> Vec<Option<f64>> {
    (0..values.len() as isize)
        .map(|i| {
            let source = i - offset;
            if source < 0 {
                None
            } else {
                values.get(source as usize).copied().flatten()
            }
        })
        .collect()
}

pub fn lag_name(column: &str, k: usize) -> String {
    format!("{}_lag{}", column, k)
}

pub fn lead_name(column: &str, k: usize) -> String {
    format!("{}_lead{}", column, k)
}

/// Add `<feature>_lag<k>` and `<feature>_lead<k>` columns to the panel and
/// return their names in insertion order
pub fn add_shifted(panel: &mut Panel, features: &[String], lags: &[usize], leads: &[usize]) -> Result<Vec<String>> {
    let mut added = Vec::new();

    for feature in features {
        let column = panel
            .column_index(feature)
            .ok_or_else(|| PrepError::MissingColumn(feature.clone()))?;

        let offsets = lags
            .iter()
            .map(|&k| (lag_name(feature, k), k as isize))
            .chain(leads.iter().map(|&k| (lead_name(feature, k), -(k as isize))));

        for (name, offset) in offsets {
            let values = panel
                .series
                .iter()
                .map(|series| {
                    let source: Vec<Option<f64>> = series.values.iter().map(|row| row[column]).collect();
                    shift(&source, offset)
                })
                .collect();
            panel.push_column(name.clone(), values)?;
            added.push(name);
        }
    }

    Ok(added)
}
