/// Linear-interpolated quantile of `values` (`q` in 0.0..=1.0)
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Tukey fences `(Q1 - k*IQR, Q3 + k*IQR)`; needs at least four values
pub fn iqr_fences(values: &[f64], factor: f64) -> Option<(f64, f64)> {
    if values.len() < 4 {
        return None;
    }
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - factor * iqr, q3 + factor * iqr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 0.5), Some(2.5));
        assert_eq!(quantile(&values, 1.0), Some(4.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_fences() {
        let (low, high) = iqr_fences(&[1.0, 2.0, 3.0, 4.0, 5.0], 1.5).unwrap();
        assert_eq!((low, high), (-1.0, 7.0));
        assert!(iqr_fences(&[1.0, 2.0], 1.5).is_none());
    }
}
