use super::{ChronoSplit, Panel, ScalerKind, Split};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Parameters of one scaled column: `(x - center) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub column: String,
    pub center: f64,
    pub scale: f64,
}

/// Column scaler fitted on the training split only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub kind: ScalerKind,
    pub columns: Vec<ColumnScale>,
}

impl Scaler {
    /// Fit one `ColumnScale` per panel column on cells whose month is in
    /// the training split
    pub fn fit(kind: ScalerKind, panel: &Panel, split: &ChronoSplit) -> Result<Self> {
        let mut columns = Vec::with_capacity(panel.columns.len());

        for (index, name) in panel.columns.iter().enumerate() {
            let train: Vec<f64> = panel
                .series
                .iter()
                .flat_map(|series| series.months.iter().zip(&series.values))
                .filter(|(month, _)| split.split_of(month) == Some(Split::Train))
                .filter_map(|(_, row)| row[index])
                .collect();

            let (center, scale) = match kind {
                ScalerKind::None => (0.0, 1.0),
                _ if train.is_empty() => (0.0, 1.0),
                ScalerKind::Minmax => {
                    let min = train.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = train.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    (min, max - min)
                }
                ScalerKind::Standard => {
                    let n = train.len() as f64;
                    let mean = train.iter().sum::<f64>() / n;
                    let variance = train.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
                    (mean, variance.sqrt())
                }
            };

            columns.push(ColumnScale {
                column: name.clone(),
                center,
                scale,
            });
        }

        Ok(Self { kind, columns })
    }

    /// Scale a value of column `index`; constant columns map to 0
    pub fn transform(&self, index: usize, value: f64) -> f64 {
        if self.kind == ScalerKind::None {
            return value;
        }
        match self.columns.get(index) {
            Some(c) if c.scale.abs() > f64::EPSILON => (value - c.center) / c.scale,
            Some(_) => 0.0,
            None => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SplitRatios;
    use crate::table::{SourceEncoding, Table};

    fn panel() -> Panel {
        let table = Table::parse(
            "year,month,visitors,flat\n2020,1,0,5\n2020,2,10,5\n2020,3,20,5\n2020,4,1000,5\n",
            SourceEncoding::Utf8,
        )
        .unwrap();
        Panel::from_table(&table, &[], &["visitors".to_string(), "flat".to_string()]).unwrap()
    }

    fn split(panel: &Panel) -> ChronoSplit {
        ChronoSplit::from_months(panel.months(), SplitRatios { train: 0.75, valid: 0.0 }).unwrap()
    }

    #[test]
    fn test_minmax_fits_on_training_months_only() {
        let p = panel();
        let scaler = Scaler::fit(ScalerKind::Minmax, &p, &split(&p)).unwrap();
        assert_eq!(scaler.columns[0].center, 0.0);
        assert_eq!(scaler.columns[0].scale, 20.0);
        assert_eq!(scaler.transform(0, 10.0), 0.5);
        // test month is out of the fitted range and stays unclipped
        assert_eq!(scaler.transform(0, 1000.0), 50.0);
    }

    #[test]
    fn test_constant_columns_scale_to_zero() {
        let p = panel();
        let scaler = Scaler::fit(ScalerKind::Standard, &p, &split(&p)).unwrap();
        assert_eq!(scaler.transform(1, 5.0), 0.0);
        assert!((scaler.transform(0, 10.0)).abs() < 1e-12);
    }
}
