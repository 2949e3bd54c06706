//! Numeric primitives shared by every analysis stage.
//!
//! All functions are pure. Degenerate inputs (empty series, zero variance,
//! zero regression denominator) resolve to 0 or to a flat fit instead of
//! producing NaN or panicking.

use serde::{Deserialize, Serialize};

/// Whether every element equals the first one. Empty counts as constant.
pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| v == first),
        None => true,
    }
}

/// Arithmetic mean; 0 for an empty series.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    if is_constant(values) {
        return values[0];
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (mean of squared deviations); 0 if n < 2.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 || is_constant(values) {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Smallest element; 0 for an empty series.
pub fn min(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Largest element; 0 for an empty series.
pub fn max(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Percentile `p` in `[0, 100]`, linearly interpolated between order
/// statistics at rank `p / 100 * (n - 1)`.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Standardized third moment; 0 if n < 3 or std = 0.
pub fn skewness(values: &[f64]) -> f64 {
    standardized_moment(values, 3, 3)
}

/// Excess kurtosis (standardized fourth moment minus 3); 0 if n < 4 or
/// std = 0.
pub fn kurtosis(values: &[f64]) -> f64 {
    if values.len() < 4 || std_dev(values) == 0.0 {
        return 0.0;
    }
    standardized_moment(values, 4, 4) - 3.0
}

fn standardized_moment(values: &[f64], order: i32, min_len: usize) -> f64 {
    if values.len() < min_len {
        return 0.0;
    }
    let s = std_dev(values);
    if s == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| ((v - m) / s).powi(order)).sum::<f64>() / values.len() as f64
}

/// Least-squares line over indices `0..n`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// A horizontal line at `level`.
    pub fn flat(level: f64) -> Self {
        Self {
            slope: 0.0,
            intercept: level,
        }
    }

    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn is_flat(&self) -> bool {
        self.slope == 0.0
    }
}

/// Least-squares fit over index. Falls back to a flat line at the mean when
/// the denominator `n·Σx² − (Σx)²` is 0.
pub fn linear_regression(values: &[f64]) -> LinearFit {
    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linear_regression_at(&xs, values)
}

/// Least-squares fit of `ys` over explicit positions `xs`. Pairs beyond the
/// shorter slice are ignored.
pub fn linear_regression_at(xs: &[f64], ys: &[f64]) -> LinearFit {
    let len = xs.len().min(ys.len());
    let (xs, ys) = (&xs[..len], &ys[..len]);
    if is_constant(ys) {
        return LinearFit::flat(mean(ys));
    }
    let n = len as f64;
    let sum_x: f64 = xs.iter().sum();
    let sum_y: f64 = ys.iter().sum();
    let sum_xy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
    let sum_xx: f64 = xs.iter().map(|x| x * x).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return LinearFit::flat(mean(ys));
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    LinearFit { slope, intercept }
}

/// Least-squares slope divided by `n / 2`, clamped to `[-1, 1]`; 0 if n < 3.
pub fn normalized_trend(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let slope = linear_regression(values).slope;
    (slope / (values.len() as f64 / 2.0)).clamp(-1.0, 1.0)
}

/// Trailing moving average: element `i` averages `values[i+1-window..=i]`
/// (shorter at the start). Returns the input unchanged if `window >= n`.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || window >= values.len() {
        return values.to_vec();
    }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        let len = (i + 1).min(window);
        out.push(sum / len as f64);
    }
    out
}

/// `(x - mean) / std` per element; empty if std = 0.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    let s = std_dev(values);
    if s == 0.0 {
        return Vec::new();
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) / s).collect()
}

/// Root mean squared error over the overlapping prefix; 0 if empty.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sse / n as f64).sqrt()
}

/// Coefficient of determination `1 − SS_res / SS_tot`, clamped to `[0, 1]`;
/// 0 if `SS_tot` is 0.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let actual = &actual[..n];
    let m = mean(actual);
    let ss_tot: f64 = actual.iter().map(|a| (a - m).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

/// Std of successive relative returns `(v[i] - v[i-1]) / v[i-1]`, skipping
/// steps whose predecessor is 0.
pub fn relative_volatility(values: &[f64]) -> f64 {
    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    std_dev(&returns)
}

/// Summary statistics of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Descriptive {
    pub count: usize,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

pub fn describe(values: &[f64]) -> Descriptive {
    let variance = variance(values);
    Descriptive {
        count: values.len(),
        mean: mean(values),
        variance,
        std_dev: variance.sqrt(),
        min: min(values),
        max: max(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn variance_needs_two_samples() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[42.0]), 0.0);
        assert_eq!(std_dev(&[42.0]), 0.0);
    }

    #[test]
    fn outlier_statistics() {
        let mut values = vec![50.0; 19];
        values.push(200.0);
        assert!(approx(mean(&values), 57.5));
        assert!(approx(variance(&values), 1068.75));
        assert!((std_dev(&values) - 32.69).abs() < 0.01);
        let z = z_scores(&values);
        assert!((z[19] - 4.36).abs() < 0.01);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
        assert!(approx(percentile(&values, 50.0), 2.5));
        assert!(approx(percentile(&values, 25.0), 1.75));
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn moments_of_symmetric_series() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(approx(skewness(&values), 0.0));
        // uniform-like spread is platykurtic
        assert!(kurtosis(&values) < 0.0);
        assert_eq!(skewness(&[1.0, 2.0]), 0.0);
        assert_eq!(kurtosis(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn regression_on_exact_line() {
        let values: Vec<f64> = (0..10).map(|i| 2.0 * i as f64 + 1.0).collect();
        let fit = linear_regression(&values);
        assert!(approx(fit.slope, 2.0));
        assert!(approx(fit.intercept, 1.0));
        assert!(approx(fit.at(10.0), 21.0));
    }

    #[test]
    fn regression_degenerate_is_flat_at_mean() {
        assert_eq!(linear_regression(&[7.0]), LinearFit::flat(7.0));
        assert_eq!(linear_regression(&[]), LinearFit::flat(0.0));
    }

    #[test]
    fn regression_over_gapped_positions() {
        let fit = linear_regression_at(&[0.0, 1.0, 3.0, 4.0], &[1.0, 3.0, 7.0, 9.0]);
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert_eq!(linear_regression_at(&[2.0, 2.0], &[1.0, 5.0]), LinearFit::flat(3.0));
    }

    #[test]
    fn normalized_trend_of_one_to_thirty() {
        let values: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        assert!(approx(normalized_trend(&values), 1.0 / 15.0));
    }

    #[test]
    fn normalized_trend_is_clamped_and_needs_three_points() {
        assert_eq!(normalized_trend(&[1.0, 100.0]), 0.0);
        assert_eq!(normalized_trend(&[0.0, 100.0, 200.0]), 1.0);
        assert_eq!(normalized_trend(&[200.0, 100.0, 0.0]), -1.0);
    }

    #[test]
    fn constant_series_is_exactly_flat() {
        let values = vec![0.1; 50];
        assert_eq!(variance(&values), 0.0);
        assert_eq!(normalized_trend(&values), 0.0);
        assert!(z_scores(&values).is_empty());
    }

    #[test]
    fn moving_average_trailing_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(moving_average(&values, 2), vec![1.0, 1.5, 2.5, 3.5, 4.5]);
        assert_eq!(moving_average(&values, 5), values.to_vec());
        assert_eq!(moving_average(&values, 9), values.to_vec());
    }

    #[test]
    fn rmse_and_r_squared() {
        let actual = [1.0, 2.0, 3.0];
        assert_eq!(rmse(&actual, &actual), 0.0);
        assert_eq!(r_squared(&actual, &actual), 1.0);
        assert_eq!(r_squared(&[5.0, 5.0], &[1.0, 9.0]), 0.0);
        // worse than the mean clamps to 0
        assert_eq!(r_squared(&actual, &[3.0, 2.0, 1.0]), 0.0);
    }

    #[test]
    fn relative_volatility_skips_zero_predecessors() {
        assert_eq!(relative_volatility(&[0.0, 5.0, 10.0, 20.0]), 0.0);
        assert!(relative_volatility(&[10.0, 20.0, 10.0, 20.0]) > 0.0);
    }

    #[test]
    fn describe_summary() {
        let d = describe(&[2.0, 4.0, 6.0]);
        assert_eq!(d.count, 3);
        assert!(approx(d.mean, 4.0));
        assert_eq!(d.min, 2.0);
        assert_eq!(d.max, 6.0);
    }
}
