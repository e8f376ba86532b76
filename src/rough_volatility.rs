//! Rough Heston-type stochastic volatility
//!
//! The variance is driven by the approximate fBM of [`crate::fbm`]:
//!
//! v_i = max(v_{i-1} + ξ √v_{i-1} ΔB^H_i, ε),   ε = 0.001
//! S_i = S_{i-1} exp((r - v_{i-1}/2) dt + √v_{i-1} dW_i)
//!
//! where dW_i = √dt (ρ Z^H_i + √(1-ρ²) Z^⊥_i) is correlated with the normal
//! Z^H_i that drove the variance shock. The price update is explicit Euler in
//! log-space and uses the variance of the *previous* step. The floor at ε is
//! a hard clamp, not a reflecting boundary.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use tracing::debug;

use crate::config::RoughVolatilityConfig;
use crate::error::{ensure_finite, ensure_positive, Error, Result};
use crate::fbm::{correlate, FractionalNoise};

/// Lower bound applied to the variance after every step
pub const VARIANCE_FLOOR: f64 = 0.001;

/// Rough volatility model with fBM-driven variance
#[derive(Debug, Clone)]
pub struct RoughVolatilityModel {
    /// Volatility of volatility (ξ)
    pub vol_of_vol: f64,
    /// Correlation between price and variance shocks (ρ)
    pub correlation: f64,
    /// Initial variance V_0
    pub initial_variance: f64,
    /// Price drift r
    pub drift: f64,
    noise: FractionalNoise,
}

/// Result of a rough volatility simulation
#[derive(Debug, Clone)]
pub struct RoughVolatilityPath {
    /// Price path
    pub prices: Vec<f64>,
    /// Variance path
    pub variances: Vec<f64>,
}

impl RoughVolatilityPath {
    /// Log-returns of the price path
    pub fn log_returns(&self) -> Vec<f64> {
        self.prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
    }

    /// Annualised realized variance of the simulated prices over horizon T
    pub fn realized_variance(&self, horizon: f64) -> f64 {
        let sum_sq: f64 = self.log_returns().iter().map(|r| r * r).sum();
        sum_sq / horizon
    }

    /// Number of steps at which the variance sits on the floor
    pub fn floor_hits(&self) -> usize {
        self.variances.iter().filter(|&&v| v <= VARIANCE_FLOOR).count()
    }
}

impl RoughVolatilityModel {
    /// Creates a new rough volatility model
    ///
    /// # Arguments
    /// * `hurst` - Hurst exponent in (0, 1), ~0.1 for rough volatility
    /// * `vol_of_vol` - Volatility of volatility (must be positive)
    /// * `correlation` - Correlation in [-1, 1]
    /// * `initial_variance` - Initial variance (must be positive)
    /// * `drift` - Price drift
    ///
    /// # Errors
    /// `InvalidInput` if any parameter is out of range
    pub fn new(
        hurst: f64,
        vol_of_vol: f64,
        correlation: f64,
        initial_variance: f64,
        drift: f64,
    ) -> Result<Self> {
        let noise = FractionalNoise::new(hurst)?;
        ensure_positive("Vol of vol", vol_of_vol)?;
        ensure_positive("Initial variance", initial_variance)?;
        ensure_finite("Drift", drift)?;
        if !(correlation.is_finite() && correlation.abs() <= 1.0) {
            return Err(Error::invalid(format!(
                "Correlation must be in [-1, 1], got {}",
                correlation
            )));
        }

        Ok(Self {
            vol_of_vol,
            correlation,
            initial_variance,
            drift,
            noise,
        })
    }

    /// Creates the model from the `[rough_volatility]` config section
    pub fn from_config(config: &RoughVolatilityConfig) -> Result<Self> {
        Self::new(
            config.hurst,
            config.vol_of_vol,
            config.correlation,
            config.initial_variance,
            config.drift,
        )
    }

    /// Hurst exponent of the driving noise
    pub fn hurst(&self) -> f64 {
        self.noise.hurst
    }

    /// Simulates price and variance over n steps of the horizon [0, T]
    ///
    /// Both returned sequences have length n + 1 with `prices[0] == s0` and
    /// `variances[0] == initial_variance`.
    ///
    /// # Errors
    /// `InvalidInput` if n = 0, T <= 0 or s0 <= 0
    pub fn simulate_rough_heston<R: Rng>(
        &self,
        rng: &mut R,
        n_steps: usize,
        horizon: f64,
        s0: f64,
    ) -> Result<RoughVolatilityPath> {
        ensure_positive("Initial price", s0)?;
        let fbm = self.noise.sample(rng, n_steps, horizon)?;

        let normal = Normal::new(0.0, 1.0).expect("standard normal parameters are valid");
        let dt = fbm.dt;
        let sqrt_dt = dt.sqrt();

        let mut prices = Vec::with_capacity(n_steps + 1);
        let mut variances = Vec::with_capacity(n_steps + 1);

        prices.push(s0);
        variances.push(self.initial_variance);

        let mut s = s0;
        let mut v = self.initial_variance;

        for (dbh, z_h) in fbm.increments.iter().zip(&fbm.innovations) {
            let sqrt_v = v.sqrt();
            let dw = sqrt_dt * correlate(*z_h, normal.sample(rng), self.correlation);

            // Price uses the variance from the start of the step
            s *= ((self.drift - 0.5 * v) * dt + sqrt_v * dw).exp();
            v = (v + self.vol_of_vol * sqrt_v * dbh).max(VARIANCE_FLOOR);

            prices.push(s);
            variances.push(v);
        }

        debug!(
            n_steps,
            horizon,
            final_price = s,
            final_variance = v,
            "simulated rough volatility path"
        );

        Ok(RoughVolatilityPath { prices, variances })
    }

    /// Generates multiple paths in parallel
    ///
    /// Path `i` uses its own `StdRng` seeded with `seed + i`, so the batch is
    /// reproducible regardless of thread scheduling.
    pub fn simulate_parallel(
        &self,
        seed: u64,
        n_paths: usize,
        n_steps: usize,
        horizon: f64,
        s0: f64,
    ) -> Result<Vec<RoughVolatilityPath>> {
        (0..n_paths)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                self.simulate_rough_heston(&mut rng, n_steps, horizon, s0)
            })
            .collect()
    }
}
