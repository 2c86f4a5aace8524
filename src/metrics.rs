//! Accuracy metrics and series statistics

/// Mean absolute error between two aligned series.
///
/// Only the common prefix is compared; an empty comparison yields 0.
pub fn mean_absolute_error(truth: &[f64], estimate: &[f64]) -> f64 {
    let n = truth.len().min(estimate.len());
    if n == 0 {
        return 0.0;
    }
    let sum: f64 = truth
        .iter()
        .zip(estimate.iter())
        .map(|(t, e)| (t - e).abs())
        .sum();
    sum / n as f64
}

/// Root-mean-squared error between two aligned series.
pub fn root_mean_squared_error(truth: &[f64], estimate: &[f64]) -> f64 {
    let n = truth.len().min(estimate.len());
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = truth
        .iter()
        .zip(estimate.iter())
        .map(|(t, e)| (t - e) * (t - e))
        .sum();
    (sum_sq / n as f64).sqrt()
}

/// Population variance (divides by `n`).
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// MAE / RMSE pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMetrics {
    pub mae: f64,
    pub rmse: f64,
}

impl ErrorMetrics {
    pub fn compute(truth: &[f64], estimate: &[f64]) -> Self {
        Self {
            mae: mean_absolute_error(truth, estimate),
            rmse: root_mean_squared_error(truth, estimate),
        }
    }
}
