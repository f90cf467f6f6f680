//! Accuracy metrics over paired `actual` / `predicted` series.
//!
//! None of these functions guard against degenerate input. A zero denominator yields
//! NaN or an infinity, and an empty input yields NaN, so undefined metrics stay visible
//! to whoever reads the result.

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() as f64 - 1.0)).sqrt()
}

/// Mean absolute error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    let abs: Vec<f64> = paired(actual, predicted).map(|(a, p)| (p - a).abs()).collect();
    mean(&abs)
}

/// Root mean squared error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let sq: Vec<f64> = paired(actual, predicted).map(|(a, p)| (p - a).powi(2)).collect();
    mean(&sq).sqrt()
}

/// Symmetric MAPE in percent: (100 / n) * sum(2|p - a| / (|p| + |a|)).
pub fn smape(actual: &[f64], predicted: &[f64]) -> f64 {
    let sum: f64 = paired(actual, predicted)
        .map(|(a, p)| 2.0 * (p - a).abs() / (p.abs() + a.abs()))
        .sum();
    100.0 / actual.len() as f64 * sum
}

/// Mean absolute percentage error in percent.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let pct: Vec<f64> = paired(actual, predicted)
        .map(|(a, p)| ((a - p) / a).abs())
        .collect();
    mean(&pct) * 100.0
}

/// Mean absolute scaled error, scaled by the naive one-step forecast error of
/// `actual` taken in slice order.
pub fn mase(actual: &[f64], predicted: &[f64]) -> f64 {
    let naive: Vec<f64> = actual.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    mae(actual, predicted) / mean(&naive)
}

/// Pearson correlation coefficient. NaN when either series has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let mx = mean(x);
    let my = mean(y);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in paired(x, y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    sxy / (sxx * syy).sqrt()
}

fn paired<'a>(a: &'a [f64], b: &'a [f64]) -> impl Iterator<Item = (f64, f64)> + 'a {
    debug_assert_eq!(a.len(), b.len());
    a.iter().copied().zip(b.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_mean_and_std() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&v), 5.0);
        assert!((sample_std(&v) - (32.0_f64 / 7.0).sqrt()).abs() < EPS);
        assert!(mean(&[]).is_nan());
        assert!(sample_std(&[3.0]).is_nan());
    }

    #[test]
    fn test_rmse_not_below_mae() {
        let actual = [3.0, 8.0, 1.0, 12.0, 7.0];
        let predicted = [2.5, 9.0, 4.0, 11.0, 7.0];
        let m = mae(&actual, &predicted);
        let r = rmse(&actual, &predicted);
        assert!(m >= 0.0 && r >= 0.0);
        assert!(r >= m);
        assert!((m - 1.1).abs() < EPS);
    }

    #[test]
    fn test_zero_actual_propagates() {
        assert!(mape(&[0.0, 10.0], &[1.0, 10.0]).is_infinite());
        assert!(mape(&[0.0, 10.0], &[0.0, 10.0]).is_nan());
        assert!(smape(&[0.0, 10.0], &[0.0, 10.0]).is_nan());
    }

    #[test]
    fn test_mase_uses_slice_order() {
        let predicted = [11.0, 21.0, 31.0];
        // naive errors 10, 10 in order; 20, 10 when permuted
        assert!((mase(&[10.0, 20.0, 30.0], &predicted) - 0.1).abs() < EPS);
        let permuted = [30.0, 10.0, 20.0];
        let m = mae(&permuted, &predicted);
        assert!((mase(&permuted, &predicted) - m / 15.0).abs() < EPS);
    }

    #[test]
    fn test_mase_constant_actual_is_undefined() {
        assert!(mase(&[5.0, 5.0, 5.0], &[4.0, 5.0, 6.0]).is_infinite());
        assert!(mase(&[5.0, 5.0], &[5.0, 5.0]).is_nan());
    }

    #[test]
    fn test_pearson() {
        let x = [1.0, 2.0, 3.0, 4.0];
        assert!((pearson(&x, &[2.0, 4.0, 6.0, 8.0]) - 1.0).abs() < EPS);
        assert!((pearson(&x, &[8.0, 6.0, 4.0, 2.0]) + 1.0).abs() < EPS);
        assert!(pearson(&x, &[3.0, 3.0, 3.0, 3.0]).is_nan());
    }
}
