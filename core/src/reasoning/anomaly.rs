//! Anomaly detection: Z-scores of per-dimension metrics against their
//! rolling baseline.

use crate::models::DimensionKey;
use crate::observation::{BaselineManager, DimensionStats};
use std::collections::HashMap;

/// The three metrics the agent watches per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    SuccessRate,
    Latency,
    RetryRate,
}

/// A dimension/metric pair whose Z-score exceeded the threshold this cycle.
#[derive(Debug, Clone)]
pub struct AnomalyFlag {
    pub dimension: DimensionKey,
    pub metric: Metric,
    pub z_score: f64,
    pub observed_value: f64,
}

/// Default Z-score threshold beyond which a dimension/metric is flagged.
pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// Compute every anomaly flag for this cycle.
///
/// Dimensions whose baseline has not yet reached the minimum-sample gate
/// are silently skipped (never raise a pattern), per the statistical
/// under-sample error-handling rule.
pub fn detect_anomalies(
    stats: &HashMap<DimensionKey, DimensionStats>,
    baselines: &BaselineManager,
    threshold: f64,
) -> Vec<AnomalyFlag> {
    let mut flags = Vec::new();
    for (dimension, stat) in stats {
        let baseline = match baselines.get(dimension) {
            Some(b) if b.has_min_samples() => b,
            _ => continue,
        };

        let success_z = baseline.success_rate.z_score(stat.success_rate);
        if success_z.abs() > threshold {
            flags.push(AnomalyFlag {
                dimension: dimension.clone(),
                metric: Metric::SuccessRate,
                z_score: success_z,
                observed_value: stat.success_rate,
            });
        }

        let latency_z = baseline.latency_ms.z_score(stat.p50_latency_ms);
        if latency_z.abs() > threshold {
            flags.push(AnomalyFlag {
                dimension: dimension.clone(),
                metric: Metric::Latency,
                z_score: latency_z,
                observed_value: stat.p50_latency_ms,
            });
        }

        let retry_z = baseline.retry_rate.z_score(stat.avg_retry);
        if retry_z.abs() > threshold {
            flags.push(AnomalyFlag {
                dimension: dimension.clone(),
                metric: Metric::RetryRate,
                z_score: retry_z,
                observed_value: stat.avg_retry,
            });
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::BaselineManager;

    #[test]
    fn test_undersampled_baseline_suppresses_anomaly() {
        let mut baselines = BaselineManager::new(0.1);
        let mut stats = HashMap::new();
        // Only 10 samples -- below MIN_SAMPLE_GATE (50).
        let stat = DimensionStats {
            total: 10,
            success_rate: 0.1, // would be a huge anomaly if allowed to fire
            p50_latency_ms: 200.0,
            p95_latency_ms: 300.0,
            p99_latency_ms: 400.0,
            avg_retry: 0.05,
        };
        stats.insert(DimensionKey::Global, stat);
        baselines.update(&stats);

        let flags = detect_anomalies(&stats, &baselines, DEFAULT_THRESHOLD);
        assert!(flags.is_empty(), "undersampled dimension must never flag");
    }

    #[test]
    fn test_flags_fire_once_sample_gate_reached() {
        let mut baselines = BaselineManager::new(0.1);
        // Feed several healthy cycles with small natural variation so the
        // baseline's variance estimate is non-zero (a perfectly flat series
        // has zero variance and every Z-score would trivially be zero).
        let wobble = [0.94, 0.96, 0.95, 0.97, 0.93, 0.95, 0.96, 0.94];
        for (i, rate) in wobble.iter().cycle().take(20).enumerate() {
            let mut stats = HashMap::new();
            stats.insert(
                DimensionKey::Global,
                DimensionStats {
                    total: 60,
                    success_rate: *rate,
                    p50_latency_ms: 200.0,
                    p95_latency_ms: 300.0,
                    p99_latency_ms: 400.0,
                    avg_retry: 0.02,
                },
            );
            baselines.update(&stats);
            let _ = i;
        }

        let degraded = DimensionStats {
            total: 60,
            success_rate: 0.3,
            p50_latency_ms: 200.0,
            p95_latency_ms: 300.0,
            p99_latency_ms: 400.0,
            avg_retry: 0.02,
        };
        let mut degraded_stats = HashMap::new();
        degraded_stats.insert(DimensionKey::Global, degraded);

        let flags = detect_anomalies(&degraded_stats, &baselines, DEFAULT_THRESHOLD);
        assert!(flags.iter().any(|f| f.metric == Metric::SuccessRate));
    }
}
