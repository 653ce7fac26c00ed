//! Time management for the agent
//!
//! The agent advances in discrete wall-clock ticks (default 100ms). Every
//! `cycle_interval_ms` worth of ticks, a reasoning/decision cycle runs.
//! Time is tracked in milliseconds rather than wall-clock `Instant`s so
//! that simulation runs are reproducible under a configurable `time_scale`.

use serde::{Deserialize, Serialize};

/// Deterministic logical clock for the agent loop.
///
/// # Example
/// ```
/// use ops_agent_core::time::SimClock;
///
/// let mut clock = SimClock::new(100, 10_000);
/// assert_eq!(clock.now_ms(), 0);
/// assert_eq!(clock.cycle_counter(), 0);
///
/// clock.advance(100);
/// assert_eq!(clock.now_ms(), 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Milliseconds elapsed since the agent started.
    now_ms: u64,
    /// Tick duration in milliseconds.
    tick_ms: u64,
    /// Duration of a reasoning/decision cycle in milliseconds.
    cycle_interval_ms: u64,
    /// Number of completed reasoning/decision cycles.
    cycle_counter: u64,
    /// Milliseconds elapsed since the last cycle boundary.
    since_last_cycle_ms: u64,
}

impl SimClock {
    /// Create a new clock.
    ///
    /// # Panics
    /// Panics if `tick_ms` is zero or `cycle_interval_ms` is not a multiple
    /// of `tick_ms`.
    pub fn new(tick_ms: u64, cycle_interval_ms: u64) -> Self {
        assert!(tick_ms > 0, "tick_ms must be positive");
        assert!(
            cycle_interval_ms >= tick_ms,
            "cycle_interval_ms must be at least one tick"
        );
        Self {
            now_ms: 0,
            tick_ms,
            cycle_interval_ms,
            cycle_counter: 0,
            since_last_cycle_ms: 0,
        }
    }

    /// Restore a clock to an exact point, e.g. from a snapshot.
    pub fn restore(tick_ms: u64, cycle_interval_ms: u64, now_ms: u64, cycle_counter: u64) -> Self {
        let mut clock = Self::new(tick_ms, cycle_interval_ms);
        clock.now_ms = now_ms;
        clock.cycle_counter = cycle_counter;
        clock
    }

    /// Advance the clock by `dt_ms` milliseconds. Returns `true` if a full
    /// cycle interval has elapsed and a reasoning/decision cycle is due.
    pub fn advance(&mut self, dt_ms: u64) -> bool {
        self.now_ms += dt_ms;
        self.since_last_cycle_ms += dt_ms;
        if self.since_last_cycle_ms >= self.cycle_interval_ms {
            self.since_last_cycle_ms -= self.cycle_interval_ms;
            self.cycle_counter += 1;
            true
        } else {
            false
        }
    }

    /// Current simulated time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Tick duration in milliseconds.
    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// Cycle interval in milliseconds.
    pub fn cycle_interval_ms(&self) -> u64 {
        self.cycle_interval_ms
    }

    /// Number of completed reasoning/decision cycles.
    pub fn cycle_counter(&self) -> u64 {
        self.cycle_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "tick_ms must be positive")]
    fn test_zero_tick_ms_panics() {
        SimClock::new(0, 1000);
    }

    #[test]
    fn test_cycle_boundary_fires_once_per_interval() {
        let mut clock = SimClock::new(100, 500);
        let mut fired = 0;
        for _ in 0..20 {
            if clock.advance(100) {
                fired += 1;
            }
        }
        assert_eq!(fired, 4, "2000ms / 500ms cycle interval = 4 cycles");
        assert_eq!(clock.cycle_counter(), 4);
    }

    #[test]
    fn test_restore_preserves_position() {
        let clock = SimClock::restore(100, 500, 12_300, 24);
        assert_eq!(clock.now_ms(), 12_300);
        assert_eq!(clock.cycle_counter(), 24);
    }
}
