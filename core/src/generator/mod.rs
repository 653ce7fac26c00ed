//! Transaction Generator (component C)
//!
//! Emits outcomes at a configured rate, reading issuer health from the
//! drift engine (component A) and multipliers from the feedback controller
//! (component B). Generated transactions are pushed into a bounded ring
//! buffer that the observation window drains each cycle.

use crate::drift::DriftEngine;
use crate::feedback::FeedbackController;
use crate::models::{Issuer, Method, Outcome, Transaction};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// How the target transaction rate evolves over time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RateSchedule {
    Constant { rate_per_sec: f64 },
    Sinusoidal {
        base_rate_per_sec: f64,
        amplitude: f64,
        period_ms: u64,
    },
    Burst {
        base_rate_per_sec: f64,
        burst_rate_per_sec: f64,
        burst_start_ms: u64,
        burst_duration_ms: u64,
    },
}

impl RateSchedule {
    fn rate_at(&self, now_ms: u64) -> f64 {
        match *self {
            RateSchedule::Constant { rate_per_sec } => rate_per_sec,
            RateSchedule::Sinusoidal {
                base_rate_per_sec,
                amplitude,
                period_ms,
            } => {
                let phase = 2.0 * std::f64::consts::PI * (now_ms as f64) / (period_ms.max(1) as f64);
                (base_rate_per_sec + amplitude * phase.sin()).max(0.0)
            }
            RateSchedule::Burst {
                base_rate_per_sec,
                burst_rate_per_sec,
                burst_start_ms,
                burst_duration_ms,
            } => {
                if now_ms >= burst_start_ms && now_ms < burst_start_ms + burst_duration_ms {
                    burst_rate_per_sec
                } else {
                    base_rate_per_sec
                }
            }
        }
    }
}

/// Static, per-run configuration for the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub schedule: RateSchedule,
    pub buffer_size: usize,
    /// Probability a non-success outcome is `soft_fail` rather than `hard_fail`.
    pub p_soft: f64,
    /// Relative weight of each issuer before volume multipliers are applied.
    pub base_weights: HashMap<Issuer, f64>,
    /// Relative weight of each payment method.
    pub method_mix: HashMap<Method, f64>,
    /// Coefficient of variation for latency sampling.
    pub latency_cv: f64,
    /// Maximum retry count (hard cap, independent of config).
    pub max_retries: u16,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let mut base_weights = HashMap::new();
        for issuer in Issuer::ALL {
            base_weights.insert(issuer, 1.0);
        }
        let mut method_mix = HashMap::new();
        for method in Method::ALL {
            method_mix.insert(method, 1.0);
        }
        Self {
            schedule: RateSchedule::Constant { rate_per_sec: 10.0 },
            buffer_size: 1000,
            p_soft: 0.5,
            base_weights,
            method_mix,
            latency_cv: 0.25,
            max_retries: 10,
        }
    }
}

/// Transaction Generator: owns the bounded ring buffer and the fractional
/// remainder of "transactions still owed" between ticks.
pub struct TransactionGenerator {
    config: GeneratorConfig,
    rng: RngManager,
    buffer: VecDeque<Transaction>,
    next_id: u64,
    fractional_carry: f64,
    last_timestamp_ms: u64,
}

impl TransactionGenerator {
    pub fn new(config: GeneratorConfig, rng: RngManager) -> Self {
        let buffer = VecDeque::with_capacity(config.buffer_size);
        Self {
            config,
            rng,
            buffer,
            next_id: 0,
            fractional_carry: 0.0,
            last_timestamp_ms: 0,
        }
    }

    /// Current contents of the ring buffer, oldest first.
    pub fn buffer(&self) -> &VecDeque<Transaction> {
        &self.buffer
    }

    /// Generate the transactions due for a tick of duration `dt_ms`,
    /// starting at `tick_start_ms`. Reads drift state and feedback
    /// multipliers; never mutates either.
    pub fn generate(
        &mut self,
        tick_start_ms: u64,
        dt_ms: u64,
        drift: &DriftEngine,
        feedback: &FeedbackController,
    ) -> usize {
        let dt_sec = dt_ms as f64 / 1000.0;
        let rate = self.config.schedule.rate_at(tick_start_ms);
        let expected = rate * dt_sec + self.fractional_carry;
        let count = expected.floor() as u64;
        self.fractional_carry = expected - count as f64;

        let weights: Vec<(Issuer, f64)> = Issuer::ALL
            .iter()
            .map(|&issuer| {
                let base = self.config.base_weights.get(&issuer).copied().unwrap_or(1.0);
                let vol_mult = feedback.volume_multiplier(issuer, tick_start_ms);
                (issuer, (base * vol_mult).max(0.0))
            })
            .collect();
        let total_weight: f64 = weights.iter().map(|(_, w)| w).sum();

        let mut produced = 0;
        for i in 0..count {
            let issuer = if total_weight <= 0.0 {
                Issuer::ALL[0]
            } else {
                self.sample_weighted(&weights, total_weight)
            };
            let method = self.sample_method();

            let state = match drift.state(issuer) {
                Some(s) => *s,
                None => continue,
            };

            let effective_p = (state.success_rate * feedback.success_multiplier(issuer, tick_start_ms))
                .clamp(0.0, 1.0);
            let effective_retry = (state.retry_prob * feedback.retry_multiplier(tick_start_ms)).clamp(0.0, 1.0);

            let draw = self.rng.next_f64();
            let outcome = if draw < effective_p {
                Outcome::Success
            } else if self.rng.next_f64() < self.config.p_soft {
                Outcome::SoftFail
            } else {
                Outcome::HardFail
            };

            let retry_count = self.sample_geometric_retry(effective_retry);
            let latency_ms = self.sample_latency(state.latency_ms);

            // Intra-tick jitter, clamped so timestamps never regress.
            let jitter = if dt_ms > 0 {
                (i as f64 / count.max(1) as f64 * dt_ms as f64) as u64
            } else {
                0
            };
            let timestamp_ms = (tick_start_ms + jitter).max(self.last_timestamp_ms);
            self.last_timestamp_ms = timestamp_ms;

            let tx = Transaction::new(
                self.next_id,
                timestamp_ms,
                issuer,
                method,
                outcome,
                latency_ms,
                retry_count,
                self.sample_amount(),
            );
            self.next_id += 1;

            if self.buffer.len() >= self.config.buffer_size {
                self.buffer.pop_front();
            }
            self.buffer.push_back(tx);
            produced += 1;
        }
        produced
    }

    fn sample_weighted(&mut self, weights: &[(Issuer, f64)], total: f64) -> Issuer {
        let mut target = self.rng.next_f64() * total;
        for &(issuer, w) in weights {
            target -= w;
            if target <= 0.0 {
                return issuer;
            }
        }
        weights.last().map(|(i, _)| *i).unwrap_or(Issuer::ALL[0])
    }

    fn sample_method(&mut self) -> Method {
        let total: f64 = self.config.method_mix.values().sum();
        if total <= 0.0 {
            return Method::ALL[0];
        }
        let mut target = self.rng.next_f64() * total;
        for &method in &Method::ALL {
            let w = self.config.method_mix.get(&method).copied().unwrap_or(0.0);
            target -= w;
            if target <= 0.0 {
                return method;
            }
        }
        Method::ALL[Method::ALL.len() - 1]
    }

    /// Geometric number of retries with success probability `1 - r`,
    /// capped at `config.max_retries`.
    fn sample_geometric_retry(&mut self, r: f64) -> u16 {
        if r <= 0.0 {
            return 0;
        }
        let mut retries = 0u16;
        while retries < self.config.max_retries {
            if self.rng.next_f64() >= r {
                break;
            }
            retries += 1;
        }
        retries
    }

    /// Lognormal-ish latency sample centred on `mean_latency_ms` with the
    /// configured coefficient of variation.
    fn sample_latency(&mut self, mean_latency_ms: f64) -> u32 {
        let z = self.rng.next_standard_normal();
        let sample = mean_latency_ms * (1.0 + self.config.latency_cv * z);
        sample.clamp(1.0, 60_000.0) as u32
    }

    fn sample_amount(&mut self) -> i64 {
        // Log-normal-ish amount centred around 1000 (minor units), purely
        // for NRV/avg-ticket-value calculations downstream.
        let z = self.rng.next_standard_normal();
        ((1000.0 * (0.5 * z).exp()) as i64).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::IssuerState;
    use std::collections::HashMap as Map;

    fn make_generator(buffer_size: usize) -> (TransactionGenerator, DriftEngine, FeedbackController) {
        let mut states = Map::new();
        for issuer in Issuer::ALL {
            states.insert(issuer, IssuerState::new(0.95, 200.0, 0.02));
        }
        let drift = DriftEngine::new(states, Map::new(), RngManager::new(1));
        let feedback = FeedbackController::new(30_000);
        let mut config = GeneratorConfig {
            schedule: RateSchedule::Constant { rate_per_sec: 100.0 },
            ..GeneratorConfig::default()
        };
        config.buffer_size = buffer_size;
        let generator = TransactionGenerator::new(config, RngManager::new(2));
        (generator, drift, feedback)
    }

    #[test]
    fn test_buffer_never_exceeds_capacity() {
        let (mut generator, drift, feedback) = make_generator(50);
        for t in 0..200u64 {
            generator.generate(t * 1000, 1000, &drift, &feedback);
            assert!(generator.buffer().len() <= 50);
        }
    }

    #[test]
    fn test_timestamps_never_regress() {
        let (mut generator, drift, feedback) = make_generator(10_000);
        for t in 0..50u64 {
            generator.generate(t * 1000, 1000, &drift, &feedback);
        }
        let mut last = 0u64;
        for tx in generator.buffer() {
            assert!(tx.timestamp_ms() >= last);
            last = tx.timestamp_ms();
        }
    }

    #[test]
    fn test_suppress_path_shrinks_issuer_share() {
        let (mut generator, drift, mut feedback) = make_generator(100_000);
        for t in 0..50u64 {
            generator.generate(t * 1000, 1000, &drift, &feedback);
        }
        let pre_share = {
            let total = generator.buffer().len() as f64;
            let icici = generator
                .buffer()
                .iter()
                .filter(|tx| tx.issuer() == Issuer::Icici)
                .count() as f64;
            icici / total
        };

        feedback.apply(
            crate::feedback::InterventionKind::SuppressPath,
            Some(Issuer::Icici),
            crate::feedback::InterventionParameters {
                duration_ms: 300_000,
                magnitude: 1.0,
            },
            50_000,
            vec![],
        );

        generator.buffer.clear();
        for t in 50..100u64 {
            generator.generate(t * 1000, 1000, &drift, &feedback);
        }
        let post_share = {
            let total = generator.buffer().len() as f64;
            let icici = generator
                .buffer()
                .iter()
                .filter(|tx| tx.issuer() == Issuer::Icici)
                .count() as f64;
            icici / total
        };

        assert!(
            post_share <= 0.2 * pre_share.max(0.01),
            "pre={} post={}",
            pre_share,
            post_share
        );
    }
}
