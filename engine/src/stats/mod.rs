//! Measurement error statistics
//!
//! Computes the sample statistics of a measurement set and propagates the
//! statistical and instrument errors into a combined absolute error.
//!
//! - Statistical error Δ_stat is the standard error of the mean, s/√n.
//! - A valid instrument error Δ_instr is added in quadrature:
//!   Δ = √(Δ_stat² + Δ_instr²).
//! - Relative error is |Δ / x̄| · 100, or zero when x̄ is zero.

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};

/// Sample statistics of a measurement set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values
    pub n: usize,
    /// Arithmetic mean x̄
    pub mean: f64,
    /// Sample standard deviation s (Bessel-corrected)
    pub stddev: f64,
    /// Standard error of the mean s/√n
    pub std_error: f64,
}

/// Compute mean, sample standard deviation and standard error
///
/// With fewer than two values the spread is undefined and both the standard
/// deviation and standard error are reported as exactly zero.
///
/// The mean is accumulated incrementally and the deviations are scaled by the
/// largest magnitude, so values close to `f64::MAX` do not overflow unless the
/// result itself is out of range.
///
/// # Errors
///
/// Returns `EngineError::EmptyMeasurements` for an empty slice.
pub fn summarize(values: &[f64]) -> Result<Summary, EngineError> {
    if values.is_empty() {
        return Err(EngineError::EmptyMeasurements);
    }

    let n = values.len();
    let count = n as f64;
    let mean = running_mean(values);

    if n < 2 {
        return Ok(Summary {
            n,
            mean,
            stddev: 0.0,
            std_error: 0.0,
        });
    }

    let scale = values.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
    let stddev = if scale == 0.0 {
        0.0
    } else {
        let scaled_mean = mean / scale;
        let scaled_variance = values
            .iter()
            .map(|x| (x / scale - scaled_mean).powi(2))
            .sum::<f64>()
            / (count - 1.0);
        scale * scaled_variance.sqrt()
    };
    let std_error = stddev / count.sqrt();

    Ok(Summary {
        n,
        mean,
        stddev,
        std_error,
    })
}

/// `mean += x/k - mean/k`; each term stays within the input range
fn running_mean(values: &[f64]) -> f64 {
    values
        .iter()
        .enumerate()
        .fold(0.0, |mean, (i, x)| {
            let k = (i + 1) as f64;
            mean + (x / k - mean / k)
        })
}

/// Combine the statistical error with an optional instrument error
pub fn combine(delta_stat: f64, instrument_error: Option<f64>) -> f64 {
    match instrument_error {
        Some(instr) => delta_stat.hypot(instr),
        None => delta_stat,
    }
}

/// Relative error in percent; zero when the mean is zero
pub fn relative_percent(delta: f64, mean: f64) -> f64 {
    if mean == 0.0 {
        0.0
    } else {
        (delta / mean).abs() * 100.0
    }
}

/// Full error budget for one calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorBudget {
    pub summary: Summary,
    /// Statistical absolute error Δ_stat
    pub delta_stat: f64,
    /// Instrument error Δ_instr, when one was incorporated
    pub instrument_error: Option<f64>,
    /// Combined absolute error Δ
    pub delta_total: f64,
    /// Relative error ε in percent
    pub rel_percent: f64,
}

impl ErrorBudget {
    /// Compute the error budget for `values`
    ///
    /// `instrument_error` must already be validated; pass `None` when the user
    /// skipped it or the stored value was unusable.
    pub fn compute(values: &[f64], instrument_error: Option<f64>) -> Result<Self, EngineError> {
        let summary = summarize(values)?;
        let delta_stat = summary.std_error;
        let instrument_error = instrument_error.map(f64::abs);
        let delta_total = combine(delta_stat, instrument_error);
        let rel_percent = relative_percent(delta_total, summary.mean);

        Ok(Self {
            summary,
            delta_stat,
            instrument_error,
            delta_total,
            rel_percent,
        })
    }

    /// Whether an instrument error was part of the combination
    pub fn used_instrument(&self) -> bool {
        self.instrument_error.is_some()
    }

    /// Whether every derived value is a finite number
    pub fn is_finite(&self) -> bool {
        [
            self.summary.mean,
            self.summary.stddev,
            self.summary.std_error,
            self.delta_stat,
            self.delta_total,
            self.rel_percent,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_summarize_four_values() {
        let summary = summarize(&[10.1, 10.2, 10.0, 10.3]).unwrap();

        assert_eq!(summary.n, 4);
        assert!(approx(summary.mean, 10.15));
        // Σ(x - x̄)² = 0.05, variance = 0.05 / 3
        let expected_s = (0.05f64 / 3.0).sqrt();
        assert!(approx(summary.stddev, expected_s));
        assert!(approx(summary.std_error, expected_s / 2.0));
    }

    #[test]
    fn test_single_value_has_zero_spread() {
        let summary = summarize(&[42.0]).unwrap();
        assert_eq!(summary.n, 1);
        assert_eq!(summary.mean, 42.0);
        assert_eq!(summary.stddev, 0.0);
        assert_eq!(summary.std_error, 0.0);
    }

    #[test]
    fn test_empty_values_rejected() {
        assert!(matches!(
            summarize(&[]),
            Err(EngineError::EmptyMeasurements)
        ));
        assert!(ErrorBudget::compute(&[], Some(0.1)).is_err());
    }

    #[test]
    fn test_combine_in_quadrature() {
        let delta = combine(0.05, Some(0.02));
        assert!(approx(delta, (0.05f64 * 0.05 + 0.02 * 0.02).sqrt()));
        assert!((delta - 0.0539).abs() < 1e-4);
    }

    #[test]
    fn test_combine_without_instrument() {
        assert_eq!(combine(0.05, None), 0.05);
    }

    #[test]
    fn test_relative_percent() {
        assert!(approx(relative_percent(0.5, 10.0), 5.0));
        assert!(approx(relative_percent(0.5, -10.0), 5.0));
        assert_eq!(relative_percent(0.5, 0.0), 0.0);
    }

    #[test]
    fn test_error_budget_with_instrument() {
        let budget = ErrorBudget::compute(&[10.1, 10.2, 10.0, 10.3], Some(-0.01)).unwrap();

        assert!(budget.used_instrument());
        assert_eq!(budget.instrument_error, Some(0.01));
        assert_eq!(budget.delta_stat, budget.summary.std_error);
        let expected = (budget.delta_stat.powi(2) + 0.0001).sqrt();
        assert!(approx(budget.delta_total, expected));
        assert!(approx(
            budget.rel_percent,
            budget.delta_total / 10.15 * 100.0
        ));
    }

    #[test]
    fn test_error_budget_without_instrument() {
        let budget = ErrorBudget::compute(&[1.0, 2.0, 3.0], None).unwrap();
        assert!(!budget.used_instrument());
        assert_eq!(budget.delta_total, budget.delta_stat);
    }

    #[test]
    fn test_zero_mean_relative_error() {
        let budget = ErrorBudget::compute(&[-1.0, 1.0], Some(0.1)).unwrap();
        assert_eq!(budget.summary.mean, 0.0);
        assert_eq!(budget.rel_percent, 0.0);
    }

    #[test]
    fn test_values_near_max_do_not_overflow() {
        let summary = summarize(&[1e308, 1e308]).unwrap();
        assert_eq!(summary.mean, 1e308);
        assert_eq!(summary.stddev, 0.0);

        let budget = ErrorBudget::compute(&[1e308, 1e308], Some(0.01)).unwrap();
        assert!(budget.is_finite());
        assert!(budget.rel_percent.is_finite());

        let summary = summarize(&[1e308, -1e308, 1e308]).unwrap();
        assert!(summary.mean.is_finite());
        assert!((summary.mean - 1e308 / 3.0).abs() <= 1e293);
    }

    #[test]
    fn test_unrepresentable_spread_is_not_finite() {
        let budget = ErrorBudget::compute(&[1.7e308, -1.7e308], None).unwrap();
        assert_eq!(budget.summary.mean, 0.0);
        assert!(!budget.is_finite());
    }
}
