//! Geometric Brownian Motion (GBM)
//!
//! dS_t = μ S_t dt + σ S_t dW_t
//!
//! Solution: S_t = S_0 exp((μ - σ²/2)t + σW_t). The hedging simulator
//! advances the underlying one exact log-step at a time.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{ensure_finite, ensure_positive, Error, Result};

/// Geometric Brownian Motion model
///
/// Models asset prices with constant drift and volatility.
/// The price is always positive due to the exponential structure.
#[derive(Debug, Clone)]
pub struct GeometricBrownianMotion {
    /// Initial price S_0
    pub s0: f64,
    /// Drift μ
    pub mu: f64,
    /// Volatility σ
    pub sigma: f64,
    normal: Normal<f64>,
}

impl GeometricBrownianMotion {
    /// Creates a new GBM model
    ///
    /// # Errors
    /// `InvalidInput` if s0 <= 0, sigma < 0 or mu is not finite
    pub fn new(s0: f64, mu: f64, sigma: f64) -> Result<Self> {
        ensure_positive("Initial price", s0)?;
        ensure_finite("Drift", mu)?;
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(Error::invalid(format!(
                "Volatility must be non-negative, got {}",
                sigma
            )));
        }

        Ok(Self {
            s0,
            mu,
            sigma,
            normal: Normal::new(0.0, 1.0).expect("standard normal parameters are valid"),
        })
    }

    /// Advances `s` by one exact step of length `dt`
    ///
    /// log(S_{t+dt}) = log(S_t) + (μ - σ²/2)dt + σ√dt Z
    pub fn step<R: Rng>(&self, rng: &mut R, s: f64, dt: f64) -> f64 {
        let z = self.normal.sample(rng);
        s * ((self.mu - 0.5 * self.sigma * self.sigma) * dt + self.sigma * dt.sqrt() * z).exp()
    }
}
