//! Truncated path signatures
//!
//! For a d-dimensional path X sampled at points x_0, ..., x_N the signature
//! up to level 2 is
//!
//! - level 0: 1
//! - level 1: S^k = Σ_i Δx_i^k = x_N^k - x_0^k
//! - level 2: S^{ab} ≈ ∫ (X^a_t - X^a_0) dX^b_t
//!
//! The level-2 integral is a left-point (Itô-style) Riemann sum: the running
//! sum of `a`-increments is taken *before* adding the current step, so a path
//! with a single increment has a zero level-2 block. Entries are not
//! symmetrised and S^{ab} generally differs from S^{ba}.
//!
//! Levels above 2 are not computed. Requesting them silently degrades to
//! level 2; [`PathSignature::effective_level`] reports what is computed.
//!
//! # Layout
//!
//! `[1, S^1 .. S^d, S^{11}, S^{12}, .., S^{dd}]` with the level-2 block in
//! row-major order (first index outer).

use tracing::debug;

use crate::error::{Error, Result};

/// Highest signature level that is actually computed
pub const MAX_COMPUTED_LEVEL: usize = 2;

/// Truncated signature of a path
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    dimension: usize,
    level: usize,
    values: Vec<f64>,
}

impl Signature {
    /// Dimension d of the underlying path
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of levels present after the constant term (1 or 2)
    pub fn level(&self) -> usize {
        self.level
    }

    /// Constant term, always 1
    pub fn level0(&self) -> f64 {
        self.values[0]
    }

    /// Level-1 terms, one per dimension
    pub fn level1(&self) -> &[f64] {
        &self.values[1..=self.dimension]
    }

    /// Level-2 term S^{d1 d2}, `None` if level 2 was not computed or out of range
    pub fn level2(&self, d1: usize, d2: usize) -> Option<f64> {
        if self.level < 2 || d1 >= self.dimension || d2 >= self.dimension {
            return None;
        }
        Some(self.values[1 + self.dimension + d1 * self.dimension + d2])
    }

    /// Lévy area (S^{ab} - S^{ba}) / 2 between two coordinates
    pub fn levy_area(&self, a: usize, b: usize) -> Option<f64> {
        Some(0.5 * (self.level2(a, b)? - self.level2(b, a)?))
    }

    /// Simplified log-signature of this signature
    ///
    /// Level-1 terms unchanged, then S^{ab} - S^{ba} for every a < b. This is
    /// only the pairwise antisymmetric part (twice the Lévy area); it is a
    /// true log-signature for the first two Lie levels and nothing more.
    pub fn log_signature(&self) -> Vec<f64> {
        let mut log_sig = Vec::with_capacity(log_signature_len(self.dimension, self.level));
        log_sig.extend_from_slice(self.level1());

        if self.level >= 2 {
            for a in 0..self.dimension {
                for b in (a + 1)..self.dimension {
                    let s_ab = self.values[1 + self.dimension + a * self.dimension + b];
                    let s_ba = self.values[1 + self.dimension + b * self.dimension + a];
                    log_sig.push(s_ab - s_ba);
                }
            }
        }

        log_sig
    }

    /// Flat signature terms, level 0 first
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Consumes the signature and returns its flat terms
    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    /// Number of signature terms
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Length of the signature vector for dimension d at a requested level
pub fn signature_len(dimension: usize, level: usize) -> usize {
    match level.min(MAX_COMPUTED_LEVEL) {
        0 => 1,
        1 => 1 + dimension,
        _ => 1 + dimension + dimension * dimension,
    }
}

/// Length of the log-signature vector for dimension d at a requested level
pub fn log_signature_len(dimension: usize, level: usize) -> usize {
    match level.min(MAX_COMPUTED_LEVEL) {
        0 => 0,
        1 => dimension,
        _ => dimension + dimension * dimension.saturating_sub(1) / 2,
    }
}

/// Signature calculator with a fixed truncation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSignature {
    truncation_level: usize,
}

impl Default for PathSignature {
    fn default() -> Self {
        Self { truncation_level: 3 }
    }
}

impl PathSignature {
    /// Creates a calculator truncated at `level`
    ///
    /// # Errors
    /// `InvalidInput` if `level` is 0
    pub fn new(level: usize) -> Result<Self> {
        if level == 0 {
            return Err(Error::invalid("Signature truncation level must be at least 1"));
        }
        if level > MAX_COMPUTED_LEVEL {
            debug!(
                requested = level,
                computed = MAX_COMPUTED_LEVEL,
                "signature levels above 2 are not computed"
            );
        }
        Ok(Self {
            truncation_level: level,
        })
    }

    /// Level as requested at construction
    pub fn truncation_level(&self) -> usize {
        self.truncation_level
    }

    /// Level actually computed, min(requested, 2)
    pub fn effective_level(&self) -> usize {
        self.truncation_level.min(MAX_COMPUTED_LEVEL)
    }

    /// Computes the truncated signature of `path`
    ///
    /// # Errors
    /// `InvalidInput` for fewer than 2 points, zero dimension, rows of
    /// different lengths or non-finite coordinates
    pub fn signature<P: AsRef<[f64]>>(&self, path: &[P]) -> Result<Signature> {
        let dimension = validate_path(path)?;
        let level = self.effective_level();

        let mut values = Vec::with_capacity(signature_len(dimension, level));
        values.push(1.0);

        let mut level1 = vec![0.0; dimension];
        let mut level2 = if level >= 2 {
            vec![0.0; dimension * dimension]
        } else {
            Vec::new()
        };
        let mut increment = vec![0.0; dimension];

        for w in path.windows(2) {
            let (prev, curr) = (w[0].as_ref(), w[1].as_ref());
            for k in 0..dimension {
                increment[k] = curr[k] - prev[k];
            }

            // level1 still holds the increments *before* this step
            if level >= 2 {
                for a in 0..dimension {
                    let running = level1[a];
                    let row = &mut level2[a * dimension..(a + 1) * dimension];
                    for (entry, inc_b) in row.iter_mut().zip(&increment) {
                        *entry += running * inc_b;
                    }
                }
            }

            for (acc, inc) in level1.iter_mut().zip(&increment) {
                *acc += inc;
            }
        }

        values.extend(level1);
        values.extend(level2);

        Ok(Signature {
            dimension,
            level,
            values,
        })
    }

    /// Simplified log-signature of `path`, see [`Signature::log_signature`]
    pub fn log_signature<P: AsRef<[f64]>>(&self, path: &[P]) -> Result<Vec<f64>> {
        Ok(self.signature(path)?.log_signature())
    }
}

fn validate_path<P: AsRef<[f64]>>(path: &[P]) -> Result<usize> {
    if path.len() < 2 {
        return Err(Error::invalid(format!(
            "Path needs at least 2 points, got {}",
            path.len()
        )));
    }

    let dimension = path[0].as_ref().len();
    if dimension == 0 {
        return Err(Error::invalid("Path dimension must be at least 1"));
    }

    for (i, point) in path.iter().enumerate() {
        let point = point.as_ref();
        if point.len() != dimension {
            return Err(Error::invalid(format!(
                "Point {} has dimension {}, expected {}",
                i,
                point.len(),
                dimension
            )));
        }
        if point.iter().any(|x| !x.is_finite()) {
            return Err(Error::invalid(format!("Point {} has a non-finite coordinate", i)));
        }
    }

    Ok(dimension)
}
