use super::FillMethod;
use crate::constants::{MONTH_COLUMN, YEAR_COLUMN, YEAR_MAX, YEAR_MIN};
use crate::error::{PrepError, Result};
use crate::table::{parse_integer, parse_number, Table};
use crate::types::{MonthRange, YearMonth};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// One group's monthly series; `months` is continuous and `values[i][c]`
/// holds column `c` of `months[i]`
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: Vec<String>,
    pub months: Vec<YearMonth>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Grouped monthly series sharing one set of value columns
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub group_keys: Vec<String>,
    pub columns: Vec<String>,
    pub series: Vec<Series>,
    /// Input rows without a valid year/month
    pub skipped_rows: usize,
}

struct Accumulator {
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl Accumulator {
    fn add(&mut self, column: usize, value: f64) {
        self.sums[column] += value;
        self.counts[column] += 1;
    }

    fn mean(&self, column: usize) -> Option<f64> {
        (self.counts[column] > 0).then(|| self.sums[column] / self.counts[column] as f64)
    }
}

fn column_index(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| PrepError::MissingColumn(name.to_string()))
}

impl Panel {
    /// Group rows by `group_keys`, average duplicate months and resample
    /// each group to a continuous monthly index. Resampled months are empty
    /// until [`Panel::fill`] runs.
    pub fn from_table(table: &Table, group_keys: &[String], value_columns: &[String]) -> Result<Self> {
        let year = column_index(table, YEAR_COLUMN)?;
        let month = column_index(table, MONTH_COLUMN)?;
        let key_indices = group_keys
            .iter()
            .map(|k| column_index(table, k))
            .collect::<Result<Vec<_>>>()?;
        let value_indices = value_columns
            .iter()
            .map(|c| column_index(table, c))
            .collect::<Result<Vec<_>>>()?;

        let width = value_columns.len();
        let mut groups: BTreeMap<Vec<String>, BTreeMap<YearMonth, Accumulator>> = BTreeMap::new();
        let mut skipped_rows = 0;

        let mut implausible_years = 0;

        for row in &table.rows {
            let cells = parse_integer(&row[year]).zip(parse_integer(&row[month]));
            let Some(target_month) = cells.and_then(|(y, m)| YearMonth::from_cells(y, m)) else {
                if cells.is_some_and(|(y, _)| !(YEAR_MIN..=YEAR_MAX).contains(&y)) {
                    implausible_years += 1;
                }
                skipped_rows += 1;
                continue;
            };

            let key: Vec<String> = key_indices.iter().map(|&i| row[i].trim().to_string()).collect();
            let acc = groups
                .entry(key)
                .or_default()
                .entry(target_month)
                .or_insert_with(|| Accumulator {
                    sums: vec![0.0; width],
                    counts: vec![0; width],
                });
            for (column, &index) in value_indices.iter().enumerate() {
                if let Some(value) = parse_number(&row[index]) {
                    acc.add(column, value);
                }
            }
        }

        if implausible_years > 0 {
            warn!(
                rows = implausible_years,
                "skipped rows with a year outside {}..={}", YEAR_MIN, YEAR_MAX
            );
        }

        let series = groups
            .into_iter()
            .filter_map(|(key, observed)| {
                let first = *observed.keys().next()?;
                let last = *observed.keys().next_back()?;
                let months = MonthRange::new(first, last).months();
                let values = months
                    .iter()
                    .map(|m| match observed.get(m) {
                        Some(acc) => (0..width).map(|c| acc.mean(c)).collect(),
                        None => vec![None; width],
                    })
                    .collect();
                debug!(?key, observed = observed.len(), months = months.len(), "panel group");
                Some(Series { key, months, values })
            })
            .collect();

        Ok(Self {
            group_keys: group_keys.to_vec(),
            columns: value_columns.to_vec(),
            series,
            skipped_rows,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Every month present in any group
    pub fn months(&self) -> BTreeSet<YearMonth> {
        self.series.iter().flat_map(|s| s.months.iter().copied()).collect()
    }

    /// Fill empty cells within each group
    pub fn fill(&mut self, method: FillMethod) {
        for series in &mut self.series {
            match method {
                FillMethod::None => {}
                FillMethod::Zero => {
                    for cell in series.values.iter_mut().flatten() {
                        cell.get_or_insert(0.0);
                    }
                }
                FillMethod::Ffill => {
                    let mut last: Vec<Option<f64>> = vec![None; self.columns.len()];
                    for row in &mut series.values {
                        for (cell, previous) in row.iter_mut().zip(last.iter_mut()) {
                            if cell.is_some() {
                                *previous = *cell;
                            } else {
                                *cell = *previous;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Append a column; `values` holds one vector per series, aligned with
    /// its months
    pub fn push_column(&mut self, name: String, values: Vec<Vec<Option<f64>>>) -> Result<()> {
        if values.len() != self.series.len() {
            return Err(PrepError::Config(format!("column {} does not match the panel groups", name)));
        }
        for (series, column) in self.series.iter_mut().zip(values) {
            if column.len() != series.months.len() {
                return Err(PrepError::Config(format!("column {} does not match the panel months", name)));
            }
            for (row, value) in series.values.iter_mut().zip(column) {
                row.push(value);
            }
        }
        self.columns.push(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SourceEncoding;

    fn panel(text: &str) -> Panel {
        let table = Table::parse(text, SourceEncoding::Utf8).unwrap();
        Panel::from_table(&table, &["region_id".to_string()], &["visitors".to_string()]).unwrap()
    }

    #[test]
    fn test_duplicates_are_averaged_and_gaps_resampled() {
        let p = panel("year,month,region_id,visitors\n2020,1,11,10\n2020,1,11,20\n2020,3,11,30\n2020,2,22,5\n,,11,1\n");
        assert_eq!(p.series.len(), 2);
        assert_eq!(p.skipped_rows, 1);

        let first = &p.series[0];
        assert_eq!(first.key, vec!["11"]);
        assert_eq!(first.months.len(), 3);
        assert_eq!(first.values, vec![vec![Some(15.0)], vec![None], vec![Some(30.0)]]);
        assert_eq!(p.months().len(), 3);
    }

    #[test]
    fn test_typo_years_do_not_stretch_the_group() {
        let p = panel("year,month,region_id,visitors\n2020,1,11,10\n2020,2,11,12\n20201,3,11,5\n");
        assert_eq!(p.skipped_rows, 1);
        assert_eq!(p.series[0].months.len(), 2);
        assert_eq!(p.months().len(), 2);
    }

    #[test]
    fn test_fill_methods() {
        let text = "year,month,region_id,visitors\n2020,1,11,10\n2020,3,11,30\n";
        let mut ffill = panel(text);
        ffill.fill(FillMethod::Ffill);
        assert_eq!(ffill.series[0].values[1], vec![Some(10.0)]);

        let mut zero = panel(text);
        zero.fill(FillMethod::Zero);
        assert_eq!(zero.series[0].values[1], vec![Some(0.0)]);
    }

    #[test]
    fn test_missing_time_columns() {
        let table = Table::parse("region_id,visitors\n11,1\n", SourceEncoding::Utf8).unwrap();
        assert!(matches!(
            Panel::from_table(&table, &[], &["visitors".to_string()]),
            Err(PrepError::MissingColumn(c)) if c == "year"
        ));
    }
}
