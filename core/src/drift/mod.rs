//! Drift Engine (component A)
//!
//! Advances each issuer's latent health parameters by one step per tick:
//! success rate follows an Ornstein-Uhlenbeck process, latency follows a
//! bounded Gaussian random walk, and retry probability follows a
//! spike-and-decay process. The drift engine exclusively owns every
//! [`IssuerState`]; other components may read but never write it.

use crate::models::Issuer;
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-issuer Ornstein-Uhlenbeck / random-walk parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriftParams {
    /// Mean-reversion rate for success rate.
    pub theta: f64,
    /// Volatility for success rate.
    pub sigma: f64,
    /// Long-run mean success rate.
    pub mean_success: f64,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            theta: 0.1,
            sigma: 0.05,
            mean_success: 0.95,
        }
    }
}

/// Latent health state of one issuer.
///
/// Invariant: after every [`DriftEngine::update`], `success_rate` is in
/// `[0, 1]`, `latency_ms` is in `[50, 2000]`, and `retry_prob` is in
/// `[0, 0.5]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IssuerState {
    pub success_rate: f64,
    pub latency_ms: f64,
    pub retry_prob: f64,
    pub last_updated_ms: u64,
}

impl IssuerState {
    pub fn new(success_rate: f64, latency_ms: f64, retry_prob: f64) -> Self {
        let state = Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            latency_ms: latency_ms.clamp(50.0, 2000.0),
            retry_prob: retry_prob.clamp(0.0, 0.5),
            last_updated_ms: 0,
        };
        debug_assert!(state.is_within_bounds());
        state
    }

    fn is_within_bounds(&self) -> bool {
        (0.0..=1.0).contains(&self.success_rate)
            && (50.0..=2000.0).contains(&self.latency_ms)
            && (0.0..=0.5).contains(&self.retry_prob)
    }
}

/// Owns every issuer's latent state and advances it each tick.
pub struct DriftEngine {
    states: HashMap<Issuer, IssuerState>,
    params: HashMap<Issuer, DriftParams>,
    rng: RngManager,
}

impl DriftEngine {
    /// Build a drift engine from initial states, optional per-issuer
    /// parameter overrides, and an independent RNG sub-stream.
    pub fn new(
        initial_states: HashMap<Issuer, IssuerState>,
        params_overrides: HashMap<Issuer, DriftParams>,
        rng: RngManager,
    ) -> Self {
        Self {
            states: initial_states,
            params: params_overrides,
            rng,
        }
    }

    /// Read-only access to one issuer's current state.
    pub fn state(&self, issuer: Issuer) -> Option<&IssuerState> {
        self.states.get(&issuer)
    }

    /// Read-only access to every issuer's current state.
    pub fn states(&self) -> &HashMap<Issuer, IssuerState> {
        &self.states
    }

    fn params_for(&self, issuer: Issuer) -> DriftParams {
        self.params.get(&issuer).copied().unwrap_or_default()
    }

    /// Advance every issuer's state by `dt_ms` milliseconds worth of drift.
    ///
    /// Deterministic for a given RNG state and `dt_ms` sequence.
    pub fn update(&mut self, dt_ms: u64, now_ms: u64) {
        let dt = dt_ms as f64 / 1000.0;
        let issuers: Vec<Issuer> = self.states.keys().copied().collect();
        for issuer in issuers {
            let params = self.params_for(issuer);
            let state = self.states.get_mut(&issuer).expect("issuer present");

            // Success rate: Ornstein-Uhlenbeck step.
            let drift_term = params.theta * (params.mean_success - state.success_rate) * dt;
            let diffusion_term = params.sigma * dt.sqrt() * self.rng.next_standard_normal();
            state.success_rate = (state.success_rate + drift_term + diffusion_term).clamp(0.0, 1.0);

            // Latency: bounded Gaussian random walk, std dev scales with sqrt(dt).
            let latency_step = self.rng.next_standard_normal() * 10.0 * dt.sqrt();
            state.latency_ms = (state.latency_ms + latency_step).clamp(50.0, 2000.0);

            // Retry probability: rare spike, otherwise multiplicative decay.
            let spike_roll = self.rng.next_f64();
            if spike_roll < 0.01 * dt {
                state.retry_prob = (state.retry_prob + 0.2).clamp(0.0, 0.5);
            } else {
                state.retry_prob = (state.retry_prob * 0.99).clamp(0.0, 0.5);
            }

            state.last_updated_ms = now_ms;
            debug_assert!(state.is_within_bounds());
        }
    }
}
