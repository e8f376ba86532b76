//! # Rough Volatility, Path Signatures and Policy Hedging
//!
//! A small research pipeline for quantitative finance:
//!
//! - simulate rough stochastic volatility driven by an approximate
//!   fractional Brownian motion,
//! - summarise any price series by its truncated path signature,
//! - evaluate a fixed feed-forward hedging policy by Monte Carlo rollout.
//!
//! ## Modules
//!
//! - [`fbm`] - Approximate fractional Brownian motion increments
//! - [`rough_volatility`] - Rough Heston-type price/variance paths
//! - [`signature`] - Truncated signatures and simplified log-signatures
//! - [`features`] - Signature features, volatility forecast, regime detection
//! - [`network`] - Hedging policy network
//! - [`hedging`] - Delta-hedging rollouts and Monte Carlo "training"
//! - [`gbm`] - Geometric Brownian Motion stepping
//! - [`monte_carlo`] - Monte Carlo summaries
//! - [`config`] - TOML configuration
//!
//! Every stochastic function takes an explicit random generator, so seeded
//! runs are reproducible.
//!
//! ## Example
//!
//! ```rust
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use rough_hedging::{FeatureBuilder, RoughVolatilityModel};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let model = RoughVolatilityModel::new(0.1, 0.3, -0.7, 0.04, 0.0).unwrap();
//! let path = model.simulate_rough_heston(&mut rng, 252, 1.0, 100.0).unwrap();
//!
//! let features = FeatureBuilder::new();
//! let vol = features.predict_volatility(&path.prices).unwrap();
//! assert!((0.01..=1.0).contains(&vol));
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod fbm;
pub mod gbm;
pub mod hedging;
pub mod monte_carlo;
pub mod network;
pub mod rough_volatility;
pub mod signature;

pub use config::SimulationConfig;
pub use error::{Error, Result};
pub use features::FeatureBuilder;
pub use fbm::FractionalNoise;
pub use gbm::GeometricBrownianMotion;
pub use hedging::{HedgingEpisode, HedgingSimulator, TrainingReport};
pub use monte_carlo::MonteCarloResult;
pub use network::{ConstantPolicy, HedgePolicy, MarketState, PolicyNetwork};
pub use rough_volatility::{RoughVolatilityModel, RoughVolatilityPath};
pub use signature::{PathSignature, Signature};
