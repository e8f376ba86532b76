//! Simulation configuration
//!
//! All sections deserialize from TOML and fall back to the reference
//! parameters for any field that is omitted:
//!
//! ```toml
//! seed = 42
//!
//! [rough_volatility]
//! hurst = 0.1
//! vol_of_vol = 0.3
//!
//! [hedging]
//! transaction_cost = 0.0
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Parameters of the rough Heston path generator
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoughVolatilityConfig {
    /// Hurst exponent H in (0, 1)
    pub hurst: f64,
    /// Volatility of volatility ξ
    pub vol_of_vol: f64,
    /// Correlation ρ between price and variance shocks
    pub correlation: f64,
    /// Initial variance v0
    pub initial_variance: f64,
    /// Price drift r
    pub drift: f64,
    pub n_steps: usize,
    /// Horizon T in years
    pub horizon: f64,
    pub initial_price: f64,
}

impl Default for RoughVolatilityConfig {
    fn default() -> Self {
        Self {
            hurst: 0.1,
            vol_of_vol: 0.3,
            correlation: -0.7,
            initial_variance: 0.04,
            drift: 0.0,
            n_steps: 252,
            horizon: 1.0,
            initial_price: 100.0,
        }
    }
}

/// Signature feature and regime detection settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Requested truncation level; anything above 2 is computed as 2
    pub signature_level: usize,
    pub regime_window: usize,
    /// Feature distance above which two windows count as different regimes
    pub regime_threshold: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            signature_level: 3,
            regime_window: 20,
            regime_threshold: 0.5,
        }
    }
}

/// Hedging rollout and episode sampling settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HedgingConfig {
    /// Proportional cost charged on every traded notional
    pub transaction_cost: f64,
    /// Rebalancing steps per episode
    pub n_steps: usize,
    pub strike: f64,
    pub maturity: f64,
    pub rate: f64,
    /// Episodes draw S0 = base_spot * U(spread_low, spread_high)
    pub base_spot: f64,
    /// Episodes draw vol = base_vol * U(spread_low, spread_high)
    pub base_vol: f64,
    pub spread_low: f64,
    pub spread_high: f64,
    /// Log the running loss every this many episodes
    pub report_interval: usize,
    pub layer_sizes: Vec<usize>,
}

impl Default for HedgingConfig {
    fn default() -> Self {
        Self {
            transaction_cost: 0.001,
            n_steps: 50,
            strike: 100.0,
            maturity: 0.25,
            rate: 0.05,
            base_spot: 100.0,
            base_vol: 0.2,
            spread_low: 0.8,
            spread_high: 1.2,
            report_interval: 100,
            layer_sizes: vec![5, 32, 32, 1],
        }
    }
}

impl HedgingConfig {
    /// Checks the settings that would otherwise panic or loop forever
    pub fn validate(&self) -> Result<()> {
        if !(self.transaction_cost.is_finite() && self.transaction_cost >= 0.0) {
            return Err(Error::invalid(format!(
                "transaction_cost must be non-negative, got {}",
                self.transaction_cost
            )));
        }
        if self.n_steps == 0 {
            return Err(Error::invalid("n_steps must be positive"));
        }
        if self.report_interval == 0 {
            return Err(Error::invalid("report_interval must be positive"));
        }
        if !(self.spread_low.is_finite()
            && self.spread_high.is_finite()
            && self.spread_low > 0.0
            && self.spread_low < self.spread_high)
        {
            return Err(Error::invalid(format!(
                "episode spread must satisfy 0 < low < high, got [{}, {})",
                self.spread_low, self.spread_high
            )));
        }
        Ok(())
    }
}

/// Top-level configuration of the demo binary
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for every random generator; entropy when absent
    pub seed: Option<u64>,
    pub rough_volatility: RoughVolatilityConfig,
    pub features: FeatureConfig,
    pub hedging: HedgingConfig,
}

impl SimulationConfig {
    /// Parses and validates a TOML document; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.hedging.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.hedging.layer_sizes, vec![5, 32, 32, 1]);
        assert_eq!(config.features.regime_threshold, 0.5);
    }

    #[test]
    fn test_partial_sections() {
        let config = SimulationConfig::from_toml_str(
            r#"
            seed = 7

            [rough_volatility]
            hurst = 0.25

            [hedging]
            transaction_cost = 0.0
            layer_sizes = [5, 8, 1]
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.rough_volatility.hurst, 0.25);
        assert_eq!(config.rough_volatility.vol_of_vol, 0.3);
        assert_eq!(config.hedging.transaction_cost, 0.0);
        assert_eq!(config.hedging.layer_sizes, vec![5, 8, 1]);
        assert_eq!(config.hedging.n_steps, 50);
    }

    #[test]
    fn test_malformed_toml() {
        let err = SimulationConfig::from_toml_str("seed = \"abc\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_spread_rejected() {
        let err = SimulationConfig::from_toml_str(
            r#"
            [hedging]
            spread_low = 1.2
            spread_high = 0.8
            "#,
        )
        .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_missing_file() {
        let err = SimulationConfig::load("/nonexistent/rough_hedging.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
