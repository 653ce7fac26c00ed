//! Deterministic random number generation
//!
//! Uses xorshift64* algorithm for fast, deterministic random number generation.
//! CRITICAL: all stochastic behaviour in the agent (drift, generation, jitter)
//! MUST go through this module.
//!
//! # Independent sub-streams
//!
//! The orchestrator owns one root [`RngManager`]. Each subsystem that needs
//! its own stream of randomness calls [`RngManager::fork`] once at
//! construction time rather than sharing the root generator. Forking mixes
//! a textual label into the current state (SplitMix64-style) to derive a
//! fresh, independent seed, so the relative order in which subsystems are
//! ticked never perturbs another subsystem's sequence.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use ops_agent_core::rng::RngManager;
///
/// let mut rng = RngManager::new(12345);
/// let value = rng.next();
/// let range_value = rng.range(0, 100); // [0, 100)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    pub fn new(seed: u64) -> Self {
        // xorshift requires a non-zero state
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value, advancing internal state.
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate a random value in range `[min, max)`.
    ///
    /// # Panics
    /// Panics if `min >= max`.
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");
        let value = self.next();
        let range_size = (max - min) as u64;
        min + (value % range_size) as i64
    }

    /// Generate a random `f64` in `[0.0, 1.0)`.
    pub fn next_f64(&mut self) -> f64 {
        let value = self.next();
        (value >> 11) as f64 * (1.0 / ((1u64 << 53) as f64))
    }

    /// Sample from the standard normal distribution via Box-Muller.
    pub fn next_standard_normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(f64::MIN_POSITIVE);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Get current RNG state (for checkpointing/replay).
    pub fn get_state(&self) -> u64 {
        self.state
    }

    /// Derive a new, independent generator from this one, labelled `label`.
    ///
    /// Deterministic: the same `(state, label)` pair always produces the
    /// same forked generator, regardless of how many times `next()` has
    /// been called on the fork afterwards.
    pub fn fork(&self, label: &str) -> RngManager {
        // SplitMix64-style mix of current state with the label's bytes.
        let z = self.state ^ splitmix_hash(label);
        let z = z.wrapping_add(0x9E3779B97F4A7C15);
        let mut x = z;
        x = (x ^ (x >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        x = (x ^ (x >> 27)).wrapping_mul(0x94D049BB133111EB);
        x ^= x >> 31;
        RngManager::new(x)
    }
}

fn splitmix_hash(label: &str) -> u64 {
    let mut h: u64 = 0xCBF29CE484222325; // FNV offset basis
    for byte in label.as_bytes() {
        h ^= *byte as u64;
        h = h.wrapping_mul(0x100000001B3);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seed_converted_to_nonzero() {
        let rng = RngManager::new(0);
        assert_ne!(rng.get_state(), 0, "Zero seed should be converted to 1");
    }

    #[test]
    #[should_panic(expected = "min must be less than max")]
    fn test_range_invalid_bounds() {
        let mut rng = RngManager::new(12345);
        rng.range(100, 50);
    }

    #[test]
    fn test_next_f64_in_range() {
        let mut rng = RngManager::new(12345);
        for _ in 0..1000 {
            let val = rng.next_f64();
            assert!(val >= 0.0 && val < 1.0);
        }
    }

    #[test]
    fn test_next_f64_deterministic() {
        let mut rng1 = RngManager::new(99999);
        let mut rng2 = RngManager::new(99999);
        for _ in 0..100 {
            assert_eq!(rng1.next_f64(), rng2.next_f64());
        }
    }

    #[test]
    fn test_fork_is_deterministic_and_independent() {
        let root1 = RngManager::new(42);
        let root2 = RngManager::new(42);

        let mut drift1 = root1.fork("drift");
        let mut drift2 = root2.fork("drift");
        let mut gen1 = root1.fork("generator");

        for _ in 0..50 {
            assert_eq!(drift1.next(), drift2.next(), "same label forks identically");
        }
        // Independent label must not reproduce the same sequence.
        assert_ne!(drift1.get_state(), gen1.next());
    }

    #[test]
    fn test_fork_order_independence() {
        // Forking "a" then "b" from a root must yield the same two streams
        // as forking "b" then "a" -- order of fork calls must not matter.
        let root = RngManager::new(7);
        let a1 = root.fork("a");
        let b1 = root.fork("b");
        let b2 = root.fork("b");
        let a2 = root.fork("a");
        assert_eq!(a1.get_state(), a2.get_state());
        assert_eq!(b1.get_state(), b2.get_state());
    }
}
