//! Signature-based features of a price series
//!
//! Prices are mapped to the 2-dimensional path of (log-return, |log-return|)
//! points. Its log-signature is followed by two classical statistics:
//!
//! `[log-signature.., realized volatility, momentum]`
//!
//! The returns are the *points* of the path, so with the default level the
//! log-signature block is `[r_N - r_1, |r_N| - |r_1|, area(r, |r|)]`, giving
//! 5 features in total.

use tracing::{debug, trace};

use crate::config::FeatureConfig;
use crate::error::{Error, Result};
use crate::signature::{log_signature_len, PathSignature};

/// Base level of the volatility forecast
const BASE_VOLATILITY: f64 = 0.2;
/// Weight of the first log-signature coordinate
const SIGNATURE_WEIGHT: f64 = 0.1;
/// Weight of the last feature (momentum)
const TAIL_WEIGHT: f64 = 0.05;
const MIN_VOLATILITY: f64 = 0.01;
const MAX_VOLATILITY: f64 = 1.0;

/// Builds feature vectors and derived signals from price series
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    signature: PathSignature,
    regime_threshold: f64,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self {
            signature: PathSignature::default(),
            regime_threshold: FeatureConfig::default().regime_threshold,
        }
    }
}

impl FeatureBuilder {
    /// Feature builder with signature level 3 (computed as 2) and threshold 0.5
    pub fn new() -> Self {
        Self::default()
    }

    /// Feature builder from the `[features]` config section
    pub fn from_config(config: &FeatureConfig) -> Result<Self> {
        if !(config.regime_threshold.is_finite() && config.regime_threshold >= 0.0) {
            return Err(Error::invalid(format!(
                "Regime threshold must be non-negative, got {}",
                config.regime_threshold
            )));
        }
        Ok(Self {
            signature: PathSignature::new(config.signature_level)?,
            regime_threshold: config.regime_threshold,
        })
    }

    /// Number of features produced for any valid price series
    pub fn feature_len(&self) -> usize {
        log_signature_len(2, self.signature.effective_level()) + 2
    }

    /// Extracts `[log-signature.., realized vol, momentum]` from prices
    ///
    /// Realized volatility is `sqrt(Σ r_i² / (len - 1))` and momentum is
    /// `ln(last) - ln(first)`. Returns are differences of log-prices, so every
    /// feature stays finite for any finite positive prices.
    ///
    /// # Errors
    /// `InvalidInput` for fewer than 2 prices or any price that is not a
    /// finite positive number
    pub fn extract_features(&self, prices: &[f64]) -> Result<Vec<f64>> {
        validate_prices(prices)?;

        let log_prices: Vec<f64> = prices.iter().map(|p| p.ln()).collect();
        let returns: Vec<f64> = log_prices.windows(2).map(|w| w[1] - w[0]).collect();
        let path: Vec<[f64; 2]> = returns.iter().map(|&r| [r, r.abs()]).collect();

        let mut features = if path.len() >= 2 {
            self.signature.log_signature(&path)?
        } else {
            // One return is one point: no increments, so every term is zero
            vec![0.0; log_signature_len(2, self.signature.effective_level())]
        };

        let realized_vol =
            (returns.iter().map(|r| r * r).sum::<f64>() / (prices.len() - 1) as f64).sqrt();
        let momentum = log_prices[log_prices.len() - 1] - log_prices[0];

        features.push(realized_vol);
        features.push(momentum);

        trace!(?features, "extracted signature features");
        Ok(features)
    }

    /// Fixed linear volatility forecast
    ///
    /// `clamp(0.2 + 0.1 * f[0] + 0.05 * f[last], 0.01, 1.0)` where `f` is the
    /// feature vector. The coefficients are not fitted; they are kept fixed
    /// so forecasts stay comparable across runs.
    pub fn predict_volatility(&self, prices: &[f64]) -> Result<f64> {
        let features = self.extract_features(prices)?;
        let first = features[0];
        let last = features[features.len() - 1];

        let prediction = BASE_VOLATILITY + SIGNATURE_WEIGHT * first + TAIL_WEIGHT * last;
        Ok(prediction.clamp(MIN_VOLATILITY, MAX_VOLATILITY))
    }

    /// Feature distance between the last `window` prices and the `window`
    /// prices before them, `None` when there are fewer than `2 * window` prices
    ///
    /// # Errors
    /// `InvalidInput` if the history is long enough but `window < 2`, or if a
    /// price in either window is invalid
    pub fn regime_distance(&self, prices: &[f64], window: usize) -> Result<Option<f64>> {
        if window.checked_mul(2).map_or(true, |needed| prices.len() < needed) {
            return Ok(None);
        }
        if window < 2 {
            return Err(Error::invalid(format!(
                "Regime window must be at least 2 prices, got {}",
                window
            )));
        }

        let end = prices.len();
        let recent = self.extract_features(&prices[end - window..])?;
        let historical = self.extract_features(&prices[end - 2 * window..end - window])?;

        Ok(Some(euclidean_distance(&recent, &historical)))
    }

    /// Compares recent and preceding windows and flags a regime change when
    /// their feature distance exceeds the threshold
    ///
    /// Returns `false` without computing anything when fewer than
    /// `2 * window` prices are available.
    pub fn detect_regime_change(&self, prices: &[f64], window: usize) -> Result<bool> {
        match self.regime_distance(prices, window)? {
            Some(distance) => {
                let changed = distance > self.regime_threshold;
                if changed {
                    debug!(distance, window, "regime change detected");
                }
                Ok(changed)
            }
            None => Ok(false),
        }
    }
}

/// Euclidean distance over the common prefix of two vectors
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

fn validate_prices(prices: &[f64]) -> Result<()> {
    if prices.len() < 2 {
        return Err(Error::invalid(format!(
            "Need at least 2 prices, got {}",
            prices.len()
        )));
    }
    if let Some((i, p)) = prices
        .iter()
        .enumerate()
        .find(|(_, p)| !(p.is_finite() && **p > 0.0))
    {
        return Err(Error::invalid(format!(
            "Price {} must be finite and positive, got {}",
            i, p
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn random_walk(rng: &mut StdRng, len: usize, vol: f64) -> Vec<f64> {
        let normal = Normal::new(0.0, vol).unwrap();
        let mut prices = vec![100.0];
        for _ in 1..len {
            let last = prices[prices.len() - 1];
            prices.push(last * normal.sample(rng).exp());
        }
        prices
    }

    #[test]
    fn test_feature_layout() {
        let builder = FeatureBuilder::new();
        let prices = [100.0, 110.0, 99.0, 105.0];
        let features = builder.extract_features(&prices).unwrap();

        let log_prices: Vec<f64> = prices.iter().map(|p| p.ln()).collect();
        let returns: Vec<f64> = log_prices.windows(2).map(|w| w[1] - w[0]).collect();
        let rv = (returns.iter().map(|r| r * r).sum::<f64>() / 3.0).sqrt();

        assert_eq!(features.len(), builder.feature_len());
        assert_eq!(features.len(), 5);
        // Level-1 terms telescope over the return path
        assert_abs_diff_eq!(features[0], returns[2] - returns[0], epsilon = 1e-12);
        assert_abs_diff_eq!(features[1], returns[2].abs() - returns[0].abs(), epsilon = 1e-12);
        assert_abs_diff_eq!(features[3], rv, epsilon = 1e-12);
        assert_abs_diff_eq!(features[4], (105.0f64 / 100.0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_two_prices() {
        let builder = FeatureBuilder::new();
        let features = builder.extract_features(&[100.0, 101.0]).unwrap();

        let r = (101.0f64 / 100.0).ln();
        assert_eq!(&features[..3], &[0.0, 0.0, 0.0]);
        assert_abs_diff_eq!(features[3], r.abs(), epsilon = 1e-12);
        assert_abs_diff_eq!(features[4], r, epsilon = 1e-12);
    }

    #[test]
    fn test_extreme_price_range_stays_finite() {
        let builder = FeatureBuilder::new();
        let prices = [1e-200, 1e-50, 1e100, 1e250];
        let features = builder.extract_features(&prices).unwrap();

        assert!(features.iter().all(|f| f.is_finite()), "{:?}", features);
        assert_abs_diff_eq!(features[4], 1e250f64.ln() - 1e-200f64.ln(), epsilon = 1e-9);

        // Two prices whose ratio overflows
        let features = builder.extract_features(&[1e-300, 1e300]).unwrap();
        assert!(features.iter().all(|f| f.is_finite()), "{:?}", features);
        assert_abs_diff_eq!(features[3], features[4], epsilon = 1e-9);

        let pred = builder.predict_volatility(&prices).unwrap();
        assert!((0.01..=1.0).contains(&pred));
    }

    #[test]
    fn test_invalid_prices() {
        let builder = FeatureBuilder::new();
        assert!(builder.extract_features(&[]).is_err());
        assert!(builder.extract_features(&[100.0]).is_err());
        assert!(builder.extract_features(&[100.0, 0.0, 101.0]).is_err());
        assert!(builder.extract_features(&[100.0, -5.0]).is_err());
        assert!(builder.extract_features(&[100.0, f64::NAN]).is_err());
        assert!(builder.predict_volatility(&[100.0, -1.0]).is_err());
    }

    #[test]
    fn test_predict_volatility_formula() {
        let builder = FeatureBuilder::new();
        let prices = [100.0, 102.0, 101.0, 103.0, 104.0];
        let features = builder.extract_features(&prices).unwrap();

        let expected = 0.2 + 0.1 * features[0] + 0.05 * features[4];
        assert_abs_diff_eq!(builder.predict_volatility(&prices).unwrap(), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_predict_volatility_bounds() {
        let builder = FeatureBuilder::new();
        let mut rng = StdRng::seed_from_u64(23);

        for vol in [0.001, 0.02, 0.5, 3.0] {
            for len in [2, 3, 20, 100] {
                let prices = random_walk(&mut rng, len, vol);
                let pred = builder.predict_volatility(&prices).unwrap();
                assert!((0.01..=1.0).contains(&pred), "prediction {} out of bounds", pred);
            }
        }

        // A late crash or spike hits the clamps
        assert_eq!(builder.predict_volatility(&[100.0, 100.0, 1e-12]).unwrap(), 0.01);
        assert_eq!(builder.predict_volatility(&[100.0, 100.0, 1e12]).unwrap(), 1.0);
    }

    #[test]
    fn test_short_history_never_signals() {
        let builder = FeatureBuilder::new();
        let mut rng = StdRng::seed_from_u64(24);
        let prices = random_walk(&mut rng, 39, 0.5);

        for window in 20..30 {
            assert!(!builder.detect_regime_change(&prices, window).unwrap());
            assert_eq!(builder.regime_distance(&prices, window).unwrap(), None);
        }
        // Invalid prices are not even inspected without enough history
        assert!(!builder.detect_regime_change(&[100.0, -1.0, 0.0], 2).unwrap());
    }

    #[test]
    fn test_huge_window_is_short_history() {
        let builder = FeatureBuilder::new();
        let prices = [100.0, 101.0, 102.0];

        for window in [usize::MAX / 2 + 1, usize::MAX, usize::MAX / 2] {
            assert!(!builder.detect_regime_change(&prices, window).unwrap());
            assert_eq!(builder.regime_distance(&prices, window).unwrap(), None);
        }
    }

    #[test]
    fn test_window_too_small() {
        let builder = FeatureBuilder::new();
        let prices = [100.0, 101.0, 102.0, 103.0];
        assert!(builder.detect_regime_change(&prices, 1).is_err());
        assert!(builder.detect_regime_change(&prices, 0).is_err());
    }

    #[test]
    fn test_stable_series_no_regime_change() {
        let builder = FeatureBuilder::new();
        let mut rng = StdRng::seed_from_u64(25);
        let prices = random_walk(&mut rng, 100, 0.01);

        assert!(!builder.detect_regime_change(&prices, 20).unwrap());
    }

    #[test]
    fn test_volatility_burst_is_regime_change() {
        let builder = FeatureBuilder::new();
        let mut rng = StdRng::seed_from_u64(26);

        let mut prices = random_walk(&mut rng, 20, 0.005);
        let last = prices[prices.len() - 1];
        // Steady crash over the most recent window
        for i in 1..=20 {
            prices.push(last * (-0.05 * i as f64).exp());
        }

        let distance = builder.regime_distance(&prices, 20).unwrap().unwrap();
        assert!(distance > 0.5, "distance {}", distance);
        assert!(builder.detect_regime_change(&prices, 20).unwrap());
    }

    #[test]
    fn test_threshold_from_config() {
        let config = FeatureConfig {
            regime_threshold: 0.0,
            ..FeatureConfig::default()
        };
        let builder = FeatureBuilder::from_config(&config).unwrap();
        let prices = [100.0, 101.0, 100.0, 102.0, 99.0, 104.0];
        assert!(builder.detect_regime_change(&prices, 3).unwrap());

        let bad = FeatureConfig {
            signature_level: 0,
            ..FeatureConfig::default()
        };
        assert!(FeatureBuilder::from_config(&bad).is_err());
    }

    #[test]
    fn test_euclidean_distance_common_prefix() {
        assert_eq!(euclidean_distance(&[3.0, 4.0, 100.0], &[0.0, 0.0]), 5.0);
        assert_eq!(euclidean_distance(&[], &[1.0]), 0.0);
    }
}
