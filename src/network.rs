//! Feed-forward hedging policy
//!
//! A fully connected network maps the 5-scalar [`MarketState`] to a raw
//! output; the hedge ratio is `tanh` of its first component. Parameters are
//! drawn once from N(0, 0.1) at construction and never change afterwards, so
//! `forward` is a pure function and the network can be shared read-only
//! between threads.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};

/// Number of inputs in a market state
pub const MARKET_STATE_DIM: usize = 5;

/// Standard deviation of the parameter initialisation
pub const INIT_STD: f64 = 0.1;

/// Largest hedge ratio magnitude returned by a policy network
///
/// `tanh` rounds to exactly ±1.0 for inputs beyond ~19, so the output is
/// pulled back inside the open interval.
pub const MAX_HEDGE_RATIO: f64 = 1.0 - f64::EPSILON;

/// Normalised inputs of the hedging policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketState {
    /// Spot / 100
    pub spot: f64,
    /// Elapsed time / maturity, in [0, 1]
    pub time: f64,
    pub volatility: f64,
    /// Hedge ratio held before this decision
    pub prev_hedge: f64,
    /// Running P&L / 1000
    pub pnl: f64,
}

impl MarketState {
    /// Builds a state from raw ledger quantities
    pub fn normalized(spot: f64, t: f64, maturity: f64, volatility: f64, prev_hedge: f64, pnl: f64) -> Self {
        Self {
            spot: spot / 100.0,
            time: t / maturity,
            volatility,
            prev_hedge,
            pnl: pnl / 1000.0,
        }
    }

    /// Network input `[spot, time, volatility, prev_hedge, pnl]`
    pub fn to_features(&self) -> [f64; MARKET_STATE_DIM] {
        [self.spot, self.time, self.volatility, self.prev_hedge, self.pnl]
    }
}

/// Anything that can choose a hedge ratio from a market state
pub trait HedgePolicy {
    fn hedge_ratio(&self, state: &MarketState) -> Result<f64>;
}

/// Policy holding the same hedge ratio at every step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantPolicy(pub f64);

impl HedgePolicy for ConstantPolicy {
    fn hedge_ratio(&self, _state: &MarketState) -> Result<f64> {
        Ok(self.0)
    }
}

/// A dense (fully connected) layer
#[derive(Debug, Clone)]
struct DenseLayer {
    /// output_size x input_size
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
    relu: bool,
}

impl DenseLayer {
    fn new<R: Rng>(input_size: usize, output_size: usize, relu: bool, normal: &Normal<f64>, rng: &mut R) -> Self {
        let weights = (0..output_size)
            .map(|_| (0..input_size).map(|_| normal.sample(rng)).collect())
            .collect();
        let biases = (0..output_size).map(|_| normal.sample(rng)).collect();

        Self {
            weights,
            biases,
            relu,
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                let sum = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias;
                if self.relu {
                    sum.max(0.0)
                } else {
                    sum
                }
            })
            .collect()
    }

    fn num_parameters(&self) -> usize {
        self.biases.len() * (1 + self.weights.first().map_or(0, Vec::len))
    }
}

/// Fixed-parameter multi-layer perceptron used as a hedging policy
#[derive(Debug, Clone)]
pub struct PolicyNetwork {
    layers: Vec<DenseLayer>,
    layer_sizes: Vec<usize>,
}

impl PolicyNetwork {
    /// Layer sizes of the reference hedging agent
    pub fn default_architecture() -> Vec<usize> {
        vec![MARKET_STATE_DIM, 32, 32, 1]
    }

    /// Creates a network with the given layer sizes, e.g. `[5, 32, 32, 1]`
    ///
    /// ReLU is applied after every layer except the last.
    ///
    /// # Errors
    /// `InvalidInput` for fewer than 2 sizes or a zero-width layer
    pub fn new<R: Rng>(layer_sizes: &[usize], rng: &mut R) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(Error::invalid(format!(
                "Network needs an input and an output layer, got {} sizes",
                layer_sizes.len()
            )));
        }
        if layer_sizes.contains(&0) {
            return Err(Error::invalid(format!(
                "Layer sizes must be positive, got {:?}",
                layer_sizes
            )));
        }

        let normal = Normal::new(0.0, INIT_STD).expect("initialisation std is positive");
        let n_layers = layer_sizes.len() - 1;
        let layers = layer_sizes
            .windows(2)
            .enumerate()
            .map(|(i, w)| DenseLayer::new(w[0], w[1], i + 1 < n_layers, &normal, rng))
            .collect();

        Ok(Self {
            layers,
            layer_sizes: layer_sizes.to_vec(),
        })
    }

    /// Layer widths from input to output
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    /// Width of the input layer
    pub fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    /// Width of the output layer
    pub fn output_size(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    /// Total number of weights and biases
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(DenseLayer::num_parameters).sum()
    }

    /// Forward pass through all layers
    ///
    /// # Errors
    /// `InvalidInput` if `input.len()` differs from the first layer size
    pub fn forward(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.check_input(input)?;
        Ok(self
            .layers
            .iter()
            .fold(input.to_vec(), |current, layer| layer.forward(&current)))
    }

    /// Outputs of every hidden layer (after ReLU)
    pub fn hidden_activations(&self, input: &[f64]) -> Result<Vec<Vec<f64>>> {
        self.check_input(input)?;

        let hidden = &self.layers[..self.layers.len() - 1];
        let mut activations = Vec::with_capacity(hidden.len());
        let mut current = input.to_vec();
        for layer in hidden {
            current = layer.forward(&current);
            activations.push(current.clone());
        }
        Ok(activations)
    }

    fn check_input(&self, input: &[f64]) -> Result<()> {
        if input.len() != self.input_size() {
            return Err(Error::invalid(format!(
                "Network expects {} inputs, got {}",
                self.input_size(),
                input.len()
            )));
        }
        Ok(())
    }
}

impl HedgePolicy for PolicyNetwork {
    /// `tanh` of the first network output, kept strictly inside (-1, 1)
    fn hedge_ratio(&self, state: &MarketState) -> Result<f64> {
        let output = self.forward(&state.to_features())?;
        let ratio = output[0].tanh();
        if ratio.is_nan() {
            return Ok(0.0);
        }
        Ok(ratio.clamp(-MAX_HEDGE_RATIO, MAX_HEDGE_RATIO))
    }
}
