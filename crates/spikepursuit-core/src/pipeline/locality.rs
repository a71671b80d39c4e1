use ndarray::{Array1, ArrayView1, ArrayView2};

/// Normalized correlation of every predictor column with `signal`.
///
/// Columns (or a signal) with zero norm correlate as 0.
pub fn correlation_map(predictor: ArrayView2<f64>, signal: ArrayView1<f64>) -> Array1<f64> {
    let signal_norm = signal.dot(&signal).sqrt();
    let projections = predictor.t().dot(&signal);
    let col_norms = predictor.map_axis(ndarray::Axis(0), |col| col.dot(&col).sqrt());
    projections
        .iter()
        .zip(col_norms.iter())
        .map(|(&p, &n)| {
            let denom = n * signal_norm;
            if denom > 0.0 {
                p / denom
            } else {
                0.0
            }
        })
        .collect()
}

/// True when no background pixel correlates more strongly than the best ROI pixel.
///
/// `roi` and `background` hold flat pixel indices into `correlation`.
pub fn locality_test(correlation: &Array1<f64>, roi: &[usize], background: &[usize]) -> bool {
    let best_in_roi = roi
        .iter()
        .map(|&i| correlation[i])
        .fold(f64::NEG_INFINITY, f64::max);
    !background.iter().any(|&i| correlation[i] > best_in_roi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn correlation_of_scaled_columns() {
        let p = array![[1.0, -2.0, 0.0], [2.0, -4.0, 0.0], [3.0, -6.0, 0.0]];
        let s = array![2.0, 4.0, 6.0];
        let corr = correlation_map(p.view(), s.view());
        assert!((corr[0] - 1.0).abs() < 1e-12);
        assert!((corr[1] + 1.0).abs() < 1e-12);
        assert_eq!(corr[2], 0.0);
    }

    #[test]
    fn locality_follows_peak_position() {
        let corr = array![0.1, 0.9, 0.3, 0.2];
        assert!(locality_test(&corr, &[1], &[2, 3]));
        assert!(!locality_test(&corr, &[2], &[1, 3]));
    }
}
