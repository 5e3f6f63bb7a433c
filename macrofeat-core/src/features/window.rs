//! Per-series kernels. Every function takes one entity's values in time order
//! and returns a series of the same length; `None` marks a missing cell.
//! A NaN input cell is read as missing.

/// Trailing-window statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollingStat {
    Mean,
    Std,
    Min,
    Max,
}

/// A cell's value, with NaN read as missing.
fn cell(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// The non-missing values of `values`, in order.
fn present_values(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().filter_map(|v| cell(*v)).collect()
}

/// `x[t] - x[t-lag]`.
pub fn diff(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i < lag {
                return None;
            }
            Some(cell(values[i])? - cell(values[i - lag])?)
        })
        .collect()
}

/// `(x[t] - x[t-1]) / x[t-1]`. A zero denominator yields a missing cell.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let prev = cell(values[i - 1])?;
            let cur = cell(values[i])?;
            if prev == 0.0 {
                None
            } else {
                Some((cur - prev) / prev)
            }
        })
        .collect()
}

/// `x[t-lag]`.
pub fn shift(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i < lag { None } else { cell(values[i - lag]) })
        .collect()
}

/// Trailing statistic over up to `window` rows ending at each row, using the
/// non-missing values inside the window. The window shrinks at the start of
/// the series instead of producing missing cells.
pub fn rolling(values: &[Option<f64>], window: usize, stat: RollingStat) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let present = present_values(&values[start..=i]);
            match stat {
                RollingStat::Mean => mean(&present),
                RollingStat::Std => sample_std(&present),
                RollingStat::Min => present.iter().copied().reduce(f64::min),
                RollingStat::Max => present.iter().copied().reduce(f64::max),
            }
        })
        .collect()
}

/// `(x - mean) / std` with the population standard deviation of the series'
/// non-missing values. A zero-variance series yields missing cells.
pub fn zscore(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present = present_values(values);
    let (Some(mu), Some(sigma)) = (mean(&present), population_std(&present)) else {
        return vec![None; values.len()];
    };
    let constant = present.iter().all(|v| *v == present[0]);
    if constant || sigma == 0.0 || !sigma.is_finite() {
        return vec![None; values.len()];
    }
    values
        .iter()
        .map(|v| cell(*v).map(|x| (x - mu) / sigma))
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Standard deviation with divisor N.
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - mu).powi(2)).sum();
    Some((ss / values.len() as f64).sqrt())
}

/// Standard deviation with divisor N - 1. Needs at least two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mu = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - mu).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}
