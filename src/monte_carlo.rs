//! Monte Carlo summaries
//!
//! Turns a batch of simulated outcomes (hedging P&L, losses) into an
//! estimate with standard error and a 95% confidence interval.

use crate::error::{Error, Result};

/// Result of a Monte Carlo simulation
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloResult {
    /// Sample mean
    pub estimate: f64,
    /// Standard error of the mean
    pub std_error: f64,
    /// 95% confidence interval (lower bound)
    pub ci_lower: f64,
    /// 95% confidence interval (upper bound)
    pub ci_upper: f64,
    /// Dispersion of the samples (population variance)
    pub variance: f64,
    pub std_dev: f64,
    /// Number of samples used
    pub n_samples: usize,
}

impl MonteCarloResult {
    /// Summarises a batch of samples
    ///
    /// # Errors
    /// `InvalidInput` for an empty batch or non-finite samples
    pub fn from_samples(samples: &[f64]) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::invalid("Cannot summarise an empty sample"));
        }
        if samples.iter().any(|x| !x.is_finite()) {
            return Err(Error::invalid("Samples must be finite"));
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_error = (variance / n).sqrt();

        // 95% CI uses z = 1.96
        let margin = 1.96 * std_error;
        Ok(Self {
            estimate: mean,
            std_error,
            ci_lower: mean - margin,
            ci_upper: mean + margin,
            variance,
            std_dev: variance.sqrt(),
            n_samples: samples.len(),
        })
    }

    /// Whether `value` lies inside the 95% confidence interval
    pub fn contains(&self, value: f64) -> bool {
        (self.ci_lower..=self.ci_upper).contains(&value)
    }
}

/// European call option payoff
pub fn call_payoff(strike: f64) -> impl Fn(f64) -> f64 {
    move |s_t| (s_t - strike).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_summary_statistics() {
        let result = MonteCarloResult::from_samples(&[1.0, 2.0, 3.0, 4.0]).unwrap();

        assert_relative_eq!(result.estimate, 2.5);
        assert_relative_eq!(result.variance, 1.25);
        assert_relative_eq!(result.std_dev, 1.25f64.sqrt());
        assert_relative_eq!(result.std_error, (1.25f64 / 4.0).sqrt());
        assert_relative_eq!(result.ci_upper - result.estimate, 1.96 * result.std_error);
        assert_eq!(result.n_samples, 4);
        assert!(result.contains(2.5));
        assert!(!result.contains(10.0));
    }

    #[test]
    fn test_single_sample() {
        let result = MonteCarloResult::from_samples(&[-3.0]).unwrap();
        assert_eq!(result.estimate, -3.0);
        assert_eq!(result.std_error, 0.0);
    }

    #[test]
    fn test_invalid_samples() {
        assert!(MonteCarloResult::from_samples(&[]).is_err());
        assert!(MonteCarloResult::from_samples(&[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_call_payoff() {
        let payoff = call_payoff(100.0);
        assert_eq!(payoff(120.0), 20.0);
        assert_eq!(payoff(80.0), 0.0);
    }
}
