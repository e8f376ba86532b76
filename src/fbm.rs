//! Approximate fractional Brownian motion
//!
//! Increments are generated as independent standard normals rescaled by
//!
//! ΔB^H_i = √dt · dt^(H - 1/2) · Z_i,   Z_i ~ N(0, 1)
//!
//! so that each increment has variance dt^(2H), the marginal scaling of a
//! true fBM increment. The increments are **not** correlated with each other:
//! this is a roughness proxy, not a covariance-exact fractional Gaussian noise
//! (no Cholesky or circulant embedding). The rough volatility model is
//! calibrated against exactly this approximation.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{ensure_positive, Error, Result};

/// Generator of approximate fBM increments for a fixed Hurst exponent
#[derive(Debug, Clone)]
pub struct FractionalNoise {
    /// Hurst exponent H in (0, 1)
    pub hurst: f64,
    normal: Normal<f64>,
}

/// One draw of the driving noise over a uniform grid
#[derive(Debug, Clone)]
pub struct FbmIncrements {
    /// Standard normals Z_i that produced each increment
    pub innovations: Vec<f64>,
    /// Scaled increments ΔB^H_i
    pub increments: Vec<f64>,
    /// Grid spacing T / n
    pub dt: f64,
}

impl FbmIncrements {
    /// Cumulative path B^H_0 = 0, B^H_i = Σ_{j<=i} ΔB^H_j (length n + 1)
    pub fn cumulative(&self) -> Vec<f64> {
        let mut path = Vec::with_capacity(self.increments.len() + 1);
        path.push(0.0);

        let mut current = 0.0;
        for dbh in &self.increments {
            current += dbh;
            path.push(current);
        }

        path
    }
}

impl FractionalNoise {
    /// Creates a generator for the given Hurst exponent
    ///
    /// # Errors
    /// `InvalidInput` unless 0 < H < 1
    pub fn new(hurst: f64) -> Result<Self> {
        if !(hurst.is_finite() && hurst > 0.0 && hurst < 1.0) {
            return Err(Error::invalid(format!(
                "Hurst exponent must lie in (0, 1), got {}",
                hurst
            )));
        }

        Ok(Self {
            hurst,
            normal: Normal::new(0.0, 1.0).expect("standard normal parameters are valid"),
        })
    }

    /// Multiplier √dt · dt^(H - 1/2) applied to each standard normal
    pub fn scale(&self, dt: f64) -> f64 {
        dt.sqrt() * dt.powf(self.hurst - 0.5)
    }

    /// Draws n increments over the horizon [0, T]
    ///
    /// # Errors
    /// `InvalidInput` if n = 0 or T is not positive
    pub fn sample<R: Rng>(&self, rng: &mut R, n_steps: usize, horizon: f64) -> Result<FbmIncrements> {
        if n_steps == 0 {
            return Err(Error::invalid("Step count must be positive"));
        }
        ensure_positive("Horizon", horizon)?;

        let dt = horizon / n_steps as f64;
        let scale = self.scale(dt);

        let innovations: Vec<f64> = (0..n_steps).map(|_| self.normal.sample(rng)).collect();
        let increments = innovations.iter().map(|z| scale * z).collect();

        Ok(FbmIncrements {
            innovations,
            increments,
            dt,
        })
    }

    /// Generates a single approximate fBM path of length n + 1 starting at 0
    pub fn generate_path<R: Rng>(&self, rng: &mut R, n_steps: usize, horizon: f64) -> Result<Vec<f64>> {
        Ok(self.sample(rng, n_steps, horizon)?.cumulative())
    }
}

/// Builds a shock with correlation `rho` to `driver` from an independent normal
///
/// Both inputs are standard normals; the result is standard normal with
/// Corr(result, driver) = rho.
pub fn correlate(driver: f64, independent: f64, rho: f64) -> f64 {
    rho * driver + (1.0 - rho * rho).max(0.0).sqrt() * independent
}

/// Computes the quadratic variation of a path
///
/// Sum of squared increments; for the approximate fBM above its expectation
/// is n · dt^(2H).
pub fn quadratic_variation(path: &[f64]) -> f64 {
    path.windows(2)
        .map(|w| {
            let diff = w[1] - w[0];
            diff * diff
        })
        .sum()
}
