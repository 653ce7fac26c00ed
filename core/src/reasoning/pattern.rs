//! Pattern classification: maps this cycle's anomaly flags onto the closed
//! set of pattern families the decision policy understands.

use super::anomaly::{AnomalyFlag, Metric};
use crate::models::{DimensionKey, Issuer};
use crate::observation::{BaselineManager, DimensionStats};
use std::collections::HashMap;

/// The closed set of pattern families.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternFamily {
    IssuerDegradation { issuer: Issuer },
    IssuerOutage { issuer: Issuer },
    RetryStorm { issuer: Option<Issuer> },
    MethodFatigue { method: crate::models::Method },
    LatencySpike { dimension: DimensionKey },
    SystemicFailure,
    Localized { dimension: DimensionKey },
}

const OUTAGE_SUCCESS_THRESHOLD: f64 = 0.4;
const RETRY_STORM_ABSOLUTE_THRESHOLD: f64 = 0.3;
const SLA_LATENCY_MS: f64 = 1500.0;

/// Classify this cycle's flags into pattern families.
///
/// Order of checks matters for `systemic_failure` vs `localized`: systemic
/// is only raised when the global dimension is itself flagged AND at least
/// three issuers are individually flagged; everything else that doesn't
/// match a more specific family collapses to `localized`.
pub fn classify(
    flags: &[AnomalyFlag],
    stats: &HashMap<DimensionKey, DimensionStats>,
    baselines: &BaselineManager,
    threshold: f64,
) -> Vec<PatternFamily> {
    let mut patterns = Vec::new();

    // Computed directly against the global baseline rather than sourced
    // from `flags`: `flags` only ever contains entries whose |z| already
    // exceeds `threshold`, which would make the "weakly negative" check
    // below vacuously false.
    let global_success_z = stats.get(&DimensionKey::Global).and_then(|stat| {
        baselines
            .get(&DimensionKey::Global)
            .filter(|b| b.has_min_samples())
            .map(|b| b.success_rate.z_score(stat.success_rate))
    });

    let flagged_issuers: Vec<Issuer> = Issuer::ALL
        .iter()
        .copied()
        .filter(|&issuer| {
            flags.iter().any(|f| {
                f.dimension == DimensionKey::Issuer(issuer) && f.metric == Metric::SuccessRate && f.z_score < -threshold
            })
        })
        .collect();

    // issuer_outage: absolute success rate < 0.4 on an issuer.
    for &issuer in &Issuer::ALL {
        if let Some(stat) = stats.get(&DimensionKey::Issuer(issuer)) {
            if stat.success_rate < OUTAGE_SUCCESS_THRESHOLD {
                patterns.push(PatternFamily::IssuerOutage { issuer });
            }
        }
    }

    // issuer_degradation: success Z < -tau on a single issuer while global
    // success Z is weakly negative (present but not itself past threshold).
    for &issuer in &flagged_issuers {
        let already_outage = patterns
            .iter()
            .any(|p| matches!(p, PatternFamily::IssuerOutage { issuer: i } if *i == issuer));
        if already_outage {
            continue;
        }
        if let Some(gz) = global_success_z {
            if gz < 0.0 && gz.abs() <= threshold {
                patterns.push(PatternFamily::IssuerDegradation { issuer });
            }
        }
    }

    // retry_storm: retry Z > tau, or absolute retry rate > 0.3, on any dimension.
    for flag in flags {
        if flag.metric == Metric::RetryRate && flag.z_score > threshold {
            let issuer = match flag.dimension {
                DimensionKey::Issuer(i) => Some(i),
                _ => None,
            };
            patterns.push(PatternFamily::RetryStorm { issuer });
        }
    }
    for (dimension, stat) in stats {
        if stat.avg_retry > RETRY_STORM_ABSOLUTE_THRESHOLD {
            let issuer = match dimension {
                DimensionKey::Issuer(i) => Some(*i),
                _ => None,
            };
            if !patterns
                .iter()
                .any(|p| matches!(p, PatternFamily::RetryStorm { issuer: i } if *i == issuer))
            {
                patterns.push(PatternFamily::RetryStorm { issuer });
            }
        }
    }

    // method_fatigue: per-method success Z < -tau, independent of issuer.
    for flag in flags {
        if let DimensionKey::Method(method) = flag.dimension {
            if flag.metric == Metric::SuccessRate && flag.z_score < -threshold {
                patterns.push(PatternFamily::MethodFatigue { method });
            }
        }
    }

    // latency_spike: latency Z > tau, or p95 above SLA.
    for flag in flags {
        if flag.metric == Metric::Latency && flag.z_score > threshold {
            patterns.push(PatternFamily::LatencySpike {
                dimension: flag.dimension.clone(),
            });
        }
    }
    for (dimension, stat) in stats {
        if stat.p95_latency_ms > SLA_LATENCY_MS
            && !patterns
                .iter()
                .any(|p| matches!(p, PatternFamily::LatencySpike { dimension: d } if d == dimension))
        {
            patterns.push(PatternFamily::LatencySpike {
                dimension: dimension.clone(),
            });
        }
    }

    // systemic_failure: global success Z < -tau AND >= 3 issuers flagged.
    let systemic = global_success_z.map(|z| z < -threshold).unwrap_or(false) && flagged_issuers.len() >= 3;
    if systemic {
        patterns.push(PatternFamily::SystemicFailure);
    } else if patterns.is_empty() && !flags.is_empty() {
        // Something was flagged but didn't match a more specific family.
        if let Some(flag) = flags.first() {
            patterns.push(PatternFamily::Localized {
                dimension: flag.dimension.clone(),
            });
        }
    }

    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::anomaly::{AnomalyFlag, Metric};

    fn flag(dimension: DimensionKey, metric: Metric, z: f64) -> AnomalyFlag {
        AnomalyFlag {
            dimension,
            metric,
            z_score: z,
            observed_value: 0.0,
        }
    }

    /// A `BaselineManager` whose global dimension has a warmed-up baseline
    /// (mean ~0.95, non-zero variance, past the minimum-sample gate) to
    /// drive Z-score-dependent classification in these tests.
    fn warmed_up_global_baseline() -> BaselineManager {
        let mut baselines = BaselineManager::new(0.1);
        let wobble = [0.94, 0.96, 0.95, 0.97, 0.93, 0.95, 0.96, 0.94];
        for rate in wobble.iter().cycle().take(20) {
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
        }
        baselines
    }

    #[test]
    fn test_issuer_outage_from_absolute_threshold() {
        let mut stats = HashMap::new();
        stats.insert(
            DimensionKey::Issuer(Issuer::Icici),
            DimensionStats {
                total: 60,
                success_rate: 0.3,
                p50_latency_ms: 200.0,
                p95_latency_ms: 300.0,
                p99_latency_ms: 400.0,
                avg_retry: 0.02,
            },
        );
        let patterns = classify(&[], &stats, &BaselineManager::new(0.1), 2.0);
        assert!(patterns.contains(&PatternFamily::IssuerOutage { issuer: Issuer::Icici }));
    }

    #[test]
    fn test_systemic_requires_three_flagged_issuers() {
        let baselines = warmed_up_global_baseline();
        let flags = vec![
            flag(DimensionKey::Issuer(Issuer::Hdfc), Metric::SuccessRate, -3.0),
            flag(DimensionKey::Issuer(Issuer::Icici), Metric::SuccessRate, -3.0),
            flag(DimensionKey::Issuer(Issuer::Axis), Metric::SuccessRate, -3.0),
        ];
        let mut stats = HashMap::new();
        stats.insert(
            DimensionKey::Global,
            DimensionStats {
                total: 60,
                success_rate: 0.3, // several sigma below the 0.95 baseline mean
                p50_latency_ms: 200.0,
                p95_latency_ms: 300.0,
                p99_latency_ms: 400.0,
                avg_retry: 0.02,
            },
        );
        let patterns = classify(&flags, &stats, &baselines, 2.0);
        assert!(patterns.contains(&PatternFamily::SystemicFailure));
    }

    #[test]
    fn test_two_flagged_issuers_is_not_systemic() {
        let baselines = warmed_up_global_baseline();
        let flags = vec![
            flag(DimensionKey::Issuer(Issuer::Hdfc), Metric::SuccessRate, -3.0),
            flag(DimensionKey::Issuer(Issuer::Icici), Metric::SuccessRate, -3.0),
        ];
        let mut stats = HashMap::new();
        stats.insert(
            DimensionKey::Global,
            DimensionStats {
                total: 60,
                success_rate: 0.3,
                p50_latency_ms: 200.0,
                p95_latency_ms: 300.0,
                p99_latency_ms: 400.0,
                avg_retry: 0.02,
            },
        );
        let patterns = classify(&flags, &stats, &baselines, 2.0);
        assert!(!patterns.contains(&PatternFamily::SystemicFailure));
    }

    #[test]
    fn test_issuer_degradation_emitted_when_global_weakly_negative() {
        // Regression test: `global_success_z` must be computed directly
        // against the baseline, not sourced from `flags` (which only ever
        // carries entries already past `threshold` and could never satisfy
        // the "weakly negative" bound below).
        let baselines = warmed_up_global_baseline();
        let flags = vec![flag(DimensionKey::Issuer(Issuer::Icici), Metric::SuccessRate, -3.0)];
        let mut stats = HashMap::new();
        stats.insert(
            DimensionKey::Global,
            DimensionStats {
                total: 60,
                success_rate: 0.935, // a touch below the 0.95 mean, not a full anomaly
                p50_latency_ms: 200.0,
                p95_latency_ms: 300.0,
                p99_latency_ms: 400.0,
                avg_retry: 0.02,
            },
        );
        let patterns = classify(&flags, &stats, &baselines, 2.0);
        assert!(patterns.contains(&PatternFamily::IssuerDegradation { issuer: Issuer::Icici }));
        assert!(!patterns.contains(&PatternFamily::SystemicFailure));
    }
}
