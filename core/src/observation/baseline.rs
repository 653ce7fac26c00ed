//! Rolling EWMA baseline, one per dimension key.
//!
//! Baselines are created lazily the first time a dimension is observed and
//! are never reset within a run: each cycle's update blends into the
//! existing estimate rather than replacing it, so the time series a
//! restarted agent sees is continuous with the one before restart
//! (provided the snapshot is restored).

use crate::models::DimensionKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{DimensionStats, MIN_SAMPLE_GATE};

/// Exponentially weighted moving average plus variance for one metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ewma {
    pub mean: f64,
    pub variance: f64,
    initialized: bool,
}

impl Ewma {
    fn new() -> Self {
        Self {
            mean: 0.0,
            variance: 0.0,
            initialized: false,
        }
    }

    fn update(&mut self, x: f64, alpha: f64) {
        if !self.initialized {
            self.mean = x;
            self.variance = 0.0;
            self.initialized = true;
            return;
        }
        let deviation = x - self.mean;
        self.mean = (1.0 - alpha) * self.mean + alpha * x;
        self.variance = (1.0 - alpha) * self.variance + alpha * deviation * deviation;
    }

    /// Z-score of `x` against this baseline. Returns `0.0` if the baseline
    /// has zero variance (avoids dividing by zero on a perfectly flat
    /// series).
    pub fn z_score(&self, x: f64) -> f64 {
        let std_dev = self.variance.sqrt();
        if std_dev < 1e-9 {
            0.0
        } else {
            (x - self.mean) / std_dev
        }
    }
}

/// The rolling baseline for a single dimension: success rate, latency, and
/// retry rate, each with its own EWMA and variance, plus a shared sample
/// count used for the minimum-sample gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub success_rate: Ewma,
    pub latency_ms: Ewma,
    pub retry_rate: Ewma,
    pub sample_count: u64,
}

impl Baseline {
    fn new() -> Self {
        Self {
            success_rate: Ewma::new(),
            latency_ms: Ewma::new(),
            retry_rate: Ewma::new(),
            sample_count: 0,
        }
    }

    /// Whether this baseline has enough samples for anomaly detection to
    /// be allowed to fire against it.
    pub fn has_min_samples(&self) -> bool {
        self.sample_count >= MIN_SAMPLE_GATE as u64
    }
}

/// Owns every dimension's [`Baseline`] and performs the once-per-cycle
/// EWMA update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineManager {
    alpha: f64,
    baselines: HashMap<DimensionKey, Baseline>,
}

impl BaselineManager {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            baselines: HashMap::new(),
        }
    }

    /// Restore from a snapshot.
    pub fn restore(alpha: f64, baselines: HashMap<DimensionKey, Baseline>) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            baselines,
        }
    }

    pub fn baselines(&self) -> &HashMap<DimensionKey, Baseline> {
        &self.baselines
    }

    pub fn get(&self, key: &DimensionKey) -> Option<&Baseline> {
        self.baselines.get(key)
    }

    /// Blend this cycle's observed stats into each dimension's baseline.
    /// Creates a new baseline lazily on first sighting; never removes one.
    pub fn update(&mut self, stats: &HashMap<DimensionKey, DimensionStats>) {
        for (key, stat) in stats {
            if stat.total == 0 {
                continue;
            }
            let baseline = self
                .baselines
                .entry(key.clone())
                .or_insert_with(Baseline::new);
            baseline.success_rate.update(stat.success_rate, self.alpha);
            baseline.latency_ms.update(stat.p50_latency_ms, self.alpha);
            baseline.retry_rate.update(stat.avg_retry, self.alpha);
            baseline.sample_count += stat.total as u64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Issuer;

    #[test]
    fn test_baseline_created_lazily_and_persists() {
        let mut manager = BaselineManager::new(0.1);
        assert!(manager.get(&DimensionKey::Global).is_none());

        let mut stats = HashMap::new();
        stats.insert(
            DimensionKey::Global,
            DimensionStats {
                total: 100,
                success_rate: 0.95,
                p50_latency_ms: 200.0,
                p95_latency_ms: 300.0,
                p99_latency_ms: 400.0,
                avg_retry: 0.1,
            },
        );
        manager.update(&stats);
        assert!(manager.get(&DimensionKey::Global).is_some());
        assert!(manager.get(&DimensionKey::Global).unwrap().has_min_samples());
    }

    #[test]
    fn test_baseline_continuity_across_cycles() {
        // P5: baseline EWMA at start of cycle C equals end of cycle C-1.
        let mut manager = BaselineManager::new(0.1);
        let mut stats = HashMap::new();
        stats.insert(
            DimensionKey::Issuer(Issuer::Hdfc),
            DimensionStats {
                total: 60,
                success_rate: 0.9,
                p50_latency_ms: 150.0,
                p95_latency_ms: 250.0,
                p99_latency_ms: 300.0,
                avg_retry: 0.05,
            },
        );
        manager.update(&stats);
        let end_of_cycle_1 = manager.get(&DimensionKey::Issuer(Issuer::Hdfc)).unwrap().success_rate.mean;

        // Start of cycle 2 reads the same value before any new update.
        let start_of_cycle_2 = manager.get(&DimensionKey::Issuer(Issuer::Hdfc)).unwrap().success_rate.mean;
        assert_eq!(end_of_cycle_1, start_of_cycle_2);
    }

    #[test]
    fn test_z_score_against_flat_baseline_is_zero() {
        let ewma = Ewma {
            mean: 0.5,
            variance: 0.0,
            initialized: true,
        };
        assert_eq!(ewma.z_score(0.9), 0.0);
    }
}
