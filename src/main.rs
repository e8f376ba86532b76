//! Command-line driver for the rough hedging research pipeline
//!
//! Run with: cargo run --release -- hedge --episodes 500

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rough_hedging::fbm::quadratic_variation;
use rough_hedging::{
    FeatureBuilder, FractionalNoise, HedgingSimulator, PathSignature, PolicyNetwork,
    RoughVolatilityModel, SimulationConfig,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "rough-hedging")]
#[command(about = "Rough volatility, path signatures and policy hedging", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for all random generators (overrides the config)
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// Verbosity level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate rough volatility paths
    RoughVol {
        /// Number of paths
        #[arg(short, long, default_value = "5")]
        paths: usize,
    },

    /// Show the signature of a small sample path
    Signature {
        /// Truncation level
        #[arg(long, default_value = "2")]
        level: usize,
    },

    /// Rolling volatility forecasts and regime checks on a simulated path
    Features {
        /// Forecast every this many steps
        #[arg(long, default_value = "10")]
        every: usize,
    },

    /// Evaluate the hedging policy by Monte Carlo rollout
    Hedge {
        /// Number of training episodes
        #[arg(short, long, default_value = "500")]
        episodes: usize,

        /// Number of test rollouts at S0 = K = 100
        #[arg(long, default_value = "100")]
        test_paths: usize,

        /// Run episodes on all cores
        #[arg(long)]
        parallel: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    match cli.command {
        Commands::RoughVol { paths } => run_rough_vol(&config, &mut rng, paths),
        Commands::Signature { level } => run_signature(level),
        Commands::Features { every } => run_features(&config, &mut rng, every),
        Commands::Hedge {
            episodes,
            test_paths,
            parallel,
        } => run_hedge(&config, &mut rng, episodes, test_paths, parallel),
    }
}

fn run_rough_vol(config: &SimulationConfig, rng: &mut StdRng, paths: usize) -> Result<()> {
    let rv = &config.rough_volatility;
    let model = RoughVolatilityModel::from_config(rv)?;

    println!("--- Rough Volatility Model ---");
    println!(
        "  H = {}, ξ = {}, ρ = {}, v0 = {}, S0 = {}",
        rv.hurst, rv.vol_of_vol, rv.correlation, rv.initial_variance, rv.initial_price
    );

    for i in 1..=paths {
        let path = model.simulate_rough_heston(rng, rv.n_steps, rv.horizon, rv.initial_price)?;
        let final_price = path.prices[path.prices.len() - 1];
        let final_variance = path.variances[path.variances.len() - 1];
        println!(
            "  Path {}: final price ${:.2}, final variance {:.4}, realized variance {:.4}, floor hits {}",
            i,
            final_price,
            final_variance,
            path.realized_variance(rv.horizon),
            path.floor_hits()
        );
    }

    let noise = FractionalNoise::new(rv.hurst)?;
    let driver = noise.generate_path(rng, rv.n_steps, rv.horizon)?;
    let dt = rv.horizon / rv.n_steps as f64;
    println!(
        "  fBM driver quadratic variation: {:.4} (expected {:.4})",
        quadratic_variation(&driver),
        rv.n_steps as f64 * dt.powf(2.0 * rv.hurst)
    );

    Ok(())
}

fn run_signature(level: usize) -> Result<()> {
    let path = [[0.0, 0.0], [1.0, 0.5], [2.0, 1.2], [3.0, 0.8]];
    let calc = PathSignature::new(level)?;

    let signature = calc.signature(&path)?;
    println!("--- Path Signature (level {}, computed {}) ---", level, calc.effective_level());
    println!("  Signature:     {:?}", signature.as_slice());
    println!("  Log-signature: {:?}", signature.log_signature());

    Ok(())
}

fn run_features(config: &SimulationConfig, rng: &mut StdRng, every: usize) -> Result<()> {
    let rv = &config.rough_volatility;
    let model = RoughVolatilityModel::from_config(rv)?;
    let path = model.simulate_rough_heston(rng, rv.n_steps, rv.horizon, rv.initial_price)?;

    let builder = FeatureBuilder::from_config(&config.features)?;
    let window = config.features.regime_window;
    let every = every.max(1);

    println!("--- Signature Features ---");
    let mut i = window + every;
    while i < path.prices.len() {
        let predicted = builder.predict_volatility(&path.prices[i - window..i])?;
        let regime_change = builder.detect_regime_change(&path.prices[..i], window)?;
        println!(
            "  Day {}: Predicted Vol = {:.4}, Regime Change = {}",
            i,
            predicted,
            if regime_change { "Yes" } else { "No" }
        );
        i += every;
    }

    Ok(())
}

fn run_hedge(
    config: &SimulationConfig,
    rng: &mut StdRng,
    episodes: usize,
    test_paths: usize,
    parallel: bool,
) -> Result<()> {
    let hedging = &config.hedging;
    let network = PolicyNetwork::new(&hedging.layer_sizes, rng)?;
    info!(
        layers = ?network.layer_sizes(),
        parameters = network.num_parameters(),
        "created policy network"
    );
    let simulator = HedgingSimulator::with_config(network, hedging.clone())?;

    let report = if parallel {
        let seed = config.seed.unwrap_or_else(rand::random);
        simulator.train_parallel(seed, episodes)?
    } else {
        simulator.train(rng, episodes)?
    };
    println!(
        "Training loss (mean squared P&L, policy fixed): {:.4} over {} episodes",
        report.mean_loss, report.episodes
    );

    if test_paths == 0 {
        return Ok(());
    }

    let result = simulator.evaluate(rng, test_paths)?;

    println!("\nTesting hedging performance:");
    println!("  Mean P&L:     {:.4} ± {:.4}", result.estimate, result.std_error);
    println!("  P&L Variance: {:.4}", result.variance);
    println!("  P&L Std Dev:  {:.4}", result.std_dev);
    println!(
        "  95% CI:       [{:.4}, {:.4}] ({})",
        result.ci_lower,
        result.ci_upper,
        if result.contains(0.0) {
            "contains zero"
        } else {
            "excludes zero"
        }
    );

    Ok(())
}
