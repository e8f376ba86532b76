//! Discrete delta-hedging rollouts and Monte Carlo evaluation
//!
//! The agent is short one European call and rebalances a position in the
//! underlying at `n_steps` equally spaced dates. At each date the policy sees
//! the normalised [`MarketState`], the trade is paid out of a cash account
//! together with a proportional transaction cost, and the underlying then
//! moves by one GBM step. At maturity
//!
//! P&L = δ S_T + cash - max(S_T - K, 0)
//!
//! # Training
//!
//! [`HedgingSimulator::train`] accumulates the squared terminal P&L over
//! random episodes and reports its running mean. **It never updates the
//! policy**: the network parameters are fixed at construction, so the loop is
//! a Monte Carlo estimate of E[P&L²] for a static random policy, not a
//! learning procedure.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use rayon::prelude::*;
use tracing::{debug, info, trace};

use crate::config::HedgingConfig;
use crate::error::{ensure_positive, Error, Result};
use crate::gbm::GeometricBrownianMotion;
use crate::monte_carlo::{call_payoff, MonteCarloResult};
use crate::network::{HedgePolicy, MarketState};

/// Outcome of one hedging rollout
#[derive(Debug, Clone, PartialEq)]
pub struct HedgingEpisode {
    /// Terminal P&L including the short option payoff
    pub pnl: f64,
    /// Underlying price at maturity
    pub terminal_spot: f64,
    /// Hedge ratio held into maturity
    pub final_hedge: f64,
    /// Sum of proportional transaction costs paid
    pub transaction_costs: f64,
}

/// Running mean of the loss at one reporting point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingCheckpoint {
    pub episode: usize,
    pub mean_loss: f64,
}

/// Summary of a Monte Carlo "training" run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub episodes: usize,
    /// Σ P&L² over all episodes
    pub total_loss: f64,
    /// total_loss / episodes
    pub mean_loss: f64,
    pub checkpoints: Vec<TrainingCheckpoint>,
}

impl TrainingReport {
    fn empty() -> Self {
        Self {
            episodes: 0,
            total_loss: 0.0,
            mean_loss: 0.0,
            checkpoints: Vec::new(),
        }
    }

    /// Adds one episode to the running loss, logging every `report_interval`
    fn record(&mut self, pnl: f64, report_interval: usize) {
        let ep = self.episodes;
        self.total_loss += pnl * pnl;
        self.episodes += 1;
        self.mean_loss = self.total_loss / self.episodes as f64;

        if ep % report_interval == 0 {
            info!("Episode {}, Avg Loss: {:.6}", ep, self.mean_loss);
            self.checkpoints.push(TrainingCheckpoint {
                episode: ep,
                mean_loss: self.mean_loss,
            });
        }
    }
}

/// Runs hedging rollouts for a policy
#[derive(Debug, Clone)]
pub struct HedgingSimulator<P> {
    policy: P,
    config: HedgingConfig,
}

impl<P: HedgePolicy> HedgingSimulator<P> {
    /// Simulator with the reference settings and the given transaction cost
    pub fn new(policy: P, transaction_cost: f64) -> Result<Self> {
        Self::with_config(
            policy,
            HedgingConfig {
                transaction_cost,
                ..HedgingConfig::default()
            },
        )
    }

    /// Simulator with a full, validated hedging config
    pub fn with_config(policy: P, config: HedgingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { policy, config })
    }

    /// The hedging policy, never modified by the simulator
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Hedging parameters in use
    pub fn config(&self) -> &HedgingConfig {
        &self.config
    }

    /// Hedges a short call from `s0` to maturity under GBM(r, vol)
    ///
    /// # Arguments
    /// * `s0` - Initial spot (must be positive)
    /// * `strike` - Option strike (must be non-negative)
    /// * `maturity` - Time to maturity in years (must be positive)
    /// * `vol` - Volatility of the underlying, also fed to the policy
    /// * `r` - Drift of the underlying
    ///
    /// # Errors
    /// `InvalidInput` for out-of-range parameters, or if the policy fails
    pub fn simulate_hedging<R: Rng>(
        &self,
        rng: &mut R,
        s0: f64,
        strike: f64,
        maturity: f64,
        vol: f64,
        r: f64,
    ) -> Result<HedgingEpisode> {
        let gbm = GeometricBrownianMotion::new(s0, r, vol)?;
        ensure_positive("Maturity", maturity)?;
        if !(strike.is_finite() && strike >= 0.0) {
            return Err(Error::invalid(format!(
                "Strike must be non-negative, got {}",
                strike
            )));
        }

        let n_steps = self.config.n_steps;
        let tc = self.config.transaction_cost;
        let dt = maturity / n_steps as f64;

        let mut s = s0;
        let mut delta = 0.0;
        let mut cash = 0.0;
        let mut pnl = 0.0;
        let mut transaction_costs = 0.0;

        for i in 0..n_steps {
            let t = i as f64 * dt;
            let state = MarketState::normalized(s, t, maturity, vol, delta, pnl);
            let new_delta = self.policy.hedge_ratio(&state)?;

            let trade = new_delta - delta;
            let cost = tc * trade.abs() * s;
            cash -= trade * s + cost;
            transaction_costs += cost;
            delta = new_delta;

            pnl = delta * s + cash;
            trace!(step = i, spot = s, delta, pnl, "rebalanced");

            s = gbm.step(rng, s, dt);
        }

        let payoff = call_payoff(strike);
        let final_pnl = delta * s + cash - payoff(s);

        Ok(HedgingEpisode {
            pnl: final_pnl,
            terminal_spot: s,
            final_hedge: delta,
            transaction_costs,
        })
    }

    /// Draws (S0, vol) for one training episode
    fn sample_episode<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        let spread = Uniform::new(self.config.spread_low, self.config.spread_high);
        let s0 = self.config.base_spot * spread.sample(rng);
        let vol = self.config.base_vol * spread.sample(rng);
        (s0, vol)
    }

    fn run_episode<R: Rng>(&self, rng: &mut R) -> Result<f64> {
        let (s0, vol) = self.sample_episode(rng);
        let episode = self.simulate_hedging(
            rng,
            s0,
            self.config.strike,
            self.config.maturity,
            vol,
            self.config.rate,
        )?;
        Ok(episode.pnl)
    }

    /// Monte Carlo estimate of the squared terminal P&L over random episodes
    ///
    /// Each episode draws S0 = 100 * U(0.8, 1.2) and vol = 0.2 * U(0.8, 1.2)
    /// (with the default config), hedges a K = 100, T = 0.25 call and adds
    /// P&L² to the running loss. The running mean is logged every
    /// `report_interval` episodes. The policy is left untouched.
    pub fn train<R: Rng>(&self, rng: &mut R, episodes: usize) -> Result<TrainingReport> {
        info!(episodes, "evaluating hedging policy (parameters stay fixed)");

        let mut report = TrainingReport::empty();
        for _ in 0..episodes {
            let pnl = self.run_episode(rng)?;
            report.record(pnl, self.config.report_interval);
        }

        debug!(mean_loss = report.mean_loss, "training loop finished");
        Ok(report)
    }

    /// P&L statistics of `n_episodes` rollouts at the configured market
    ///
    /// Every rollout starts from `base_spot` with volatility `base_vol` and
    /// hedges the configured strike, maturity and rate.
    pub fn evaluate<R: Rng>(&self, rng: &mut R, n_episodes: usize) -> Result<MonteCarloResult> {
        let c = &self.config;
        let pnls = (0..n_episodes)
            .map(|_| {
                self.simulate_hedging(rng, c.base_spot, c.strike, c.maturity, c.base_vol, c.rate)
                    .map(|episode| episode.pnl)
            })
            .collect::<Result<Vec<f64>>>()?;

        MonteCarloResult::from_samples(&pnls)
    }
}

impl<P: HedgePolicy + Sync> HedgingSimulator<P> {
    /// Parallel version of [`train`](Self::train)
    ///
    /// Episode `i` uses its own `StdRng` seeded with `seed + i`; the report
    /// is identical for a given seed regardless of the thread count.
    pub fn train_parallel(&self, seed: u64, episodes: usize) -> Result<TrainingReport> {
        info!(episodes, seed, "evaluating hedging policy in parallel");

        let pnls = (0..episodes)
            .into_par_iter()
            .map(|ep| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(ep as u64));
                self.run_episode(&mut rng)
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut report = TrainingReport::empty();
        for pnl in pnls {
            report.record(pnl, self.config.report_interval);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ConstantPolicy, PolicyNetwork};
    use approx::assert_abs_diff_eq;

    fn network_agent(seed: u64) -> HedgingSimulator<PolicyNetwork> {
        let mut rng = StdRng::seed_from_u64(seed);
        let net = PolicyNetwork::new(&PolicyNetwork::default_architecture(), &mut rng).unwrap();
        HedgingSimulator::new(net, 0.001).unwrap()
    }

    #[test]
    fn test_zero_cost_full_hedge() {
        let sim = HedgingSimulator::new(ConstantPolicy(1.0), 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..100 {
            let ep = sim.simulate_hedging(&mut rng, 100.0, 100.0, 0.25, 0.2, 0.05).unwrap();
            let expected = ep.terminal_spot - 100.0 - (ep.terminal_spot - 100.0).max(0.0);
            assert_abs_diff_eq!(ep.pnl, expected, epsilon = 1e-9);
            assert_eq!(ep.transaction_costs, 0.0);
        }
    }

    #[test]
    fn test_full_hedge_pays_cost_once() {
        let sim = HedgingSimulator::new(ConstantPolicy(1.0), 0.001).unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let ep = sim.simulate_hedging(&mut rng, 95.0, 100.0, 0.25, 0.2, 0.05).unwrap();
        let expected =
            ep.terminal_spot - 95.0 - 0.001 * 95.0 - (ep.terminal_spot - 100.0).max(0.0);
        assert_abs_diff_eq!(ep.transaction_costs, 0.095, epsilon = 1e-12);
        assert_abs_diff_eq!(ep.pnl, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_unhedged_loses_payoff() {
        let sim = HedgingSimulator::new(ConstantPolicy(0.0), 0.001).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let ep = sim.simulate_hedging(&mut rng, 100.0, 90.0, 0.25, 0.3, 0.0).unwrap();
        assert_eq!(ep.pnl, -(ep.terminal_spot - 90.0).max(0.0));
        assert_eq!(ep.final_hedge, 0.0);
    }

    #[test]
    fn test_network_rollout_is_reproducible() {
        let sim = network_agent(4);
        let a = sim
            .simulate_hedging(&mut StdRng::seed_from_u64(5), 100.0, 100.0, 0.25, 0.2, 0.05)
            .unwrap();
        let b = sim
            .simulate_hedging(&mut StdRng::seed_from_u64(5), 100.0, 100.0, 0.25, 0.2, 0.05)
            .unwrap();

        assert_eq!(a, b);
        assert!(a.pnl.is_finite());
        assert!(a.final_hedge > -1.0 && a.final_hedge < 1.0);
    }

    #[test]
    fn test_paths_not_reused_across_calls() {
        let sim = network_agent(6);
        let mut rng = StdRng::seed_from_u64(7);
        let a = sim.simulate_hedging(&mut rng, 100.0, 100.0, 0.25, 0.2, 0.05).unwrap();
        let b = sim.simulate_hedging(&mut rng, 100.0, 100.0, 0.25, 0.2, 0.05).unwrap();
        assert_ne!(a.terminal_spot, b.terminal_spot);
    }

    #[test]
    fn test_train_reports_mean_squared_pnl() {
        let sim = network_agent(8);
        let report = sim.train(&mut StdRng::seed_from_u64(9), 250).unwrap();

        assert_eq!(report.episodes, 250);
        assert_abs_diff_eq!(report.mean_loss, report.total_loss / 250.0, epsilon = 1e-12);
        let episodes: Vec<usize> = report.checkpoints.iter().map(|c| c.episode).collect();
        assert_eq!(episodes, vec![0, 100, 200]);
        assert!(report.mean_loss > 0.0);
    }

    #[test]
    fn test_train_matches_manual_rollouts() {
        let sim = network_agent(10);
        let report = sim.train(&mut StdRng::seed_from_u64(11), 20).unwrap();

        // Replay the same random stream by hand
        let mut rng = StdRng::seed_from_u64(11);
        let spread = Uniform::new(0.8, 1.2);
        let mut total = 0.0;
        for _ in 0..20 {
            let s0 = 100.0 * spread.sample(&mut rng);
            let vol = 0.2 * spread.sample(&mut rng);
            let pnl = sim.simulate_hedging(&mut rng, s0, 100.0, 0.25, vol, 0.05).unwrap().pnl;
            total += pnl * pnl;
        }
        assert_abs_diff_eq!(report.total_loss, total, epsilon = 1e-9);
    }

    #[test]
    fn test_train_leaves_policy_unchanged() {
        let sim = network_agent(12);
        let input = [1.0, 0.0, 0.2, 0.0, 0.0];
        let before = sim.policy().forward(&input).unwrap();
        sim.train(&mut StdRng::seed_from_u64(13), 50).unwrap();
        assert_eq!(sim.policy().forward(&input).unwrap(), before);
    }

    #[test]
    fn test_train_parallel_reproducible() {
        let sim = network_agent(14);
        let a = sim.train_parallel(15, 300).unwrap();
        let b = sim.train_parallel(15, 300).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.checkpoints.len(), 3);
    }

    #[test]
    fn test_zero_episodes() {
        let sim = network_agent(16);
        let report = sim.train(&mut StdRng::seed_from_u64(17), 0).unwrap();
        assert_eq!(report.episodes, 0);
        assert_eq!(report.mean_loss, 0.0);
        assert!(report.checkpoints.is_empty());
    }

    #[test]
    fn test_running_loss_checkpoints() {
        let mut report = TrainingReport::empty();
        report.record(2.0, 2);
        assert_eq!(report.checkpoints, vec![TrainingCheckpoint { episode: 0, mean_loss: 4.0 }]);

        report.record(0.0, 2);
        assert_eq!(report.checkpoints.len(), 1);
        assert_eq!(report.mean_loss, 2.0);

        report.record(-1.0, 2);
        assert_eq!(report.episodes, 3);
        assert_eq!(report.total_loss, 5.0);
        assert_eq!(report.checkpoints[1], TrainingCheckpoint { episode: 2, mean_loss: 5.0 / 3.0 });
    }

    #[test]
    fn test_train_checkpoints_follow_running_mean() {
        let sim = network_agent(21);
        let report = sim.train(&mut StdRng::seed_from_u64(22), 150).unwrap();
        let prefix = sim.train(&mut StdRng::seed_from_u64(22), 101).unwrap();

        // The checkpoint at episode 100 only depends on the first 101 episodes
        assert_eq!(report.checkpoints[..2], prefix.checkpoints[..]);
        assert_abs_diff_eq!(report.checkpoints[1].mean_loss, prefix.mean_loss, epsilon = 1e-12);
    }

    #[test]
    fn test_evaluate_unhedged_matches_call_value() {
        // Unhedged short call: mean P&L is minus the undiscounted call value
        let config = HedgingConfig {
            transaction_cost: 0.0,
            maturity: 1.0,
            rate: 0.0,
            ..HedgingConfig::default()
        };
        let sim = HedgingSimulator::with_config(ConstantPolicy(0.0), config).unwrap();
        let result = sim.evaluate(&mut StdRng::seed_from_u64(18), 20_000).unwrap();

        // Black-Scholes ATM call with r = 0, σ = 0.2, T = 1 is 7.9656
        assert!(
            (result.estimate + 7.9656).abs() < 4.0 * result.std_error,
            "estimate {} ± {}",
            result.estimate,
            result.std_error
        );
        assert_eq!(result.n_samples, 20_000);
    }

    #[test]
    fn test_invalid_inputs() {
        let sim = network_agent(19);
        let mut rng = StdRng::seed_from_u64(20);
        assert!(sim.simulate_hedging(&mut rng, 0.0, 100.0, 0.25, 0.2, 0.05).is_err());
        assert!(sim.simulate_hedging(&mut rng, 100.0, -1.0, 0.25, 0.2, 0.05).is_err());
        assert!(sim.simulate_hedging(&mut rng, 100.0, 100.0, 0.0, 0.2, 0.05).is_err());
        assert!(sim.simulate_hedging(&mut rng, 100.0, 100.0, 0.25, -0.2, 0.05).is_err());
        assert!(HedgingSimulator::new(ConstantPolicy(1.0), -0.1).is_err());
    }
}
