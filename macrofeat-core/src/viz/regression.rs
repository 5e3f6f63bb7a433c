//! Ordinary least squares for the scatter overlay.

use crate::error::{MacroError, Result};
use serde::{Deserialize, Serialize};

/// Fitted line `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    pub intercept: f64,
    pub slope: f64,
    pub r_squared: f64,
    /// Number of points used.
    pub n: usize,
}

impl OlsFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Legend label, e.g. `R² = 0.871`.
    pub fn label(&self) -> String {
        format!("R² = {:.3}", self.r_squared)
    }
}

/// Fit `y` on `x`. Needs at least two points and some spread in `x`.
///
/// A constant `y` is a perfect fit (R² = 1).
pub fn fit_ols(xs: &[f64], ys: &[f64]) -> Result<OlsFit> {
    if xs.len() != ys.len() {
        return Err(MacroError::invalid_input(format!(
            "x has {} values, y has {}",
            xs.len(),
            ys.len()
        )));
    }
    let n = xs.len();
    if n < 2 {
        return Err(MacroError::invalid_input(format!(
            "regression needs at least 2 points, got {n}"
        )));
    }

    let nf = n as f64;
    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx <= 0.0 || !sxx.is_finite() {
        return Err(MacroError::invalid_input("x has no variance"));
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r_squared = if syy == 0.0 {
        1.0
    } else {
        (sxy * sxy) / (sxx * syy)
    };

    Ok(OlsFit {
        intercept,
        slope,
        r_squared,
        n,
    })
}
