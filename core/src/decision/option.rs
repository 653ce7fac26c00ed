//! Candidate interventions generated from active patterns.

use crate::feedback::InterventionKind;
use crate::models::Issuer;
use crate::reasoning::PatternFamily;

/// Expected effect of an option, used by the NRV calculation.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedOutcome {
    pub expected_success_lift: f64,
    pub expected_latency_delta_ms: f64,
}

/// Costs/risks an option carries, used by the NRV calculation.
#[derive(Debug, Clone, Copy)]
pub struct Tradeoffs {
    pub intervention_cost: f64,
    pub risk_penalty: f64,
}

/// A candidate intervention the policy may select.
#[derive(Debug, Clone)]
pub struct InterventionOption {
    pub kind: InterventionKind,
    pub target: Option<Issuer>,
    pub duration_ms: u64,
    pub expected_outcome: ExpectedOutcome,
    pub tradeoffs: Tradeoffs,
    pub reversible: bool,
    pub blast_radius: f64,
    pub hypothesis_confidence: f64,
}

/// Enumerate every candidate option whose target domain matches `pattern`.
/// `alert_ops` is always available regardless of pattern, per the spec.
pub fn options_for_pattern(pattern: &PatternFamily, hypothesis_confidence: f64) -> Vec<InterventionOption> {
    let mut options = vec![alert_ops_option(hypothesis_confidence)];

    match pattern {
        PatternFamily::IssuerOutage { issuer } => {
            options.push(InterventionOption {
                kind: InterventionKind::SuppressPath,
                target: Some(*issuer),
                duration_ms: 300_000,
                expected_outcome: ExpectedOutcome {
                    expected_success_lift: 0.25,
                    expected_latency_delta_ms: -50.0,
                },
                tradeoffs: Tradeoffs {
                    intervention_cost: 50.0,
                    risk_penalty: 10.0,
                },
                reversible: true,
                blast_radius: 0.25,
                hypothesis_confidence,
            });
            options.push(InterventionOption {
                kind: InterventionKind::RerouteTraffic,
                target: Some(*issuer),
                duration_ms: 300_000,
                expected_outcome: ExpectedOutcome {
                    expected_success_lift: 0.15,
                    expected_latency_delta_ms: 30.0,
                },
                tradeoffs: Tradeoffs {
                    intervention_cost: 80.0,
                    risk_penalty: 15.0,
                },
                reversible: true,
                blast_radius: 0.3,
                hypothesis_confidence,
            });
        }
        PatternFamily::IssuerDegradation { issuer } => {
            options.push(InterventionOption {
                kind: InterventionKind::SuppressPath,
                target: Some(*issuer),
                duration_ms: 300_000,
                expected_outcome: ExpectedOutcome {
                    expected_success_lift: 0.1,
                    expected_latency_delta_ms: -20.0,
                },
                tradeoffs: Tradeoffs {
                    intervention_cost: 40.0,
                    risk_penalty: 8.0,
                },
                reversible: true,
                blast_radius: 0.2,
                hypothesis_confidence,
            });
        }
        PatternFamily::RetryStorm { issuer } => {
            options.push(InterventionOption {
                kind: InterventionKind::ReduceRetryAttempts,
                target: *issuer,
                duration_ms: 300_000,
                expected_outcome: ExpectedOutcome {
                    expected_success_lift: 0.05,
                    expected_latency_delta_ms: -100.0,
                },
                tradeoffs: Tradeoffs {
                    intervention_cost: 20.0,
                    risk_penalty: 5.0,
                },
                reversible: true,
                blast_radius: 0.15,
                hypothesis_confidence,
            });
            options.push(InterventionOption {
                kind: InterventionKind::AdjustRetry,
                target: *issuer,
                duration_ms: 300_000,
                expected_outcome: ExpectedOutcome {
                    expected_success_lift: 0.03,
                    expected_latency_delta_ms: -60.0,
                },
                tradeoffs: Tradeoffs {
                    intervention_cost: 15.0,
                    risk_penalty: 4.0,
                },
                reversible: true,
                blast_radius: 0.1,
                hypothesis_confidence,
            });
        }
        PatternFamily::MethodFatigue { .. } | PatternFamily::LatencySpike { .. } => {
            options.push(InterventionOption {
                kind: InterventionKind::RerouteTraffic,
                target: None,
                duration_ms: 300_000,
                expected_outcome: ExpectedOutcome {
                    expected_success_lift: 0.08,
                    expected_latency_delta_ms: -80.0,
                },
                tradeoffs: Tradeoffs {
                    intervention_cost: 60.0,
                    risk_penalty: 12.0,
                },
                reversible: true,
                blast_radius: 0.3,
                hypothesis_confidence,
            });
        }
        PatternFamily::SystemicFailure => {
            options.push(InterventionOption {
                kind: InterventionKind::ReduceRetryAttempts,
                target: None,
                duration_ms: 300_000,
                expected_outcome: ExpectedOutcome {
                    expected_success_lift: 0.1,
                    expected_latency_delta_ms: -150.0,
                },
                tradeoffs: Tradeoffs {
                    intervention_cost: 100.0,
                    risk_penalty: 30.0,
                },
                reversible: true,
                blast_radius: 0.5,
                hypothesis_confidence,
            });
        }
        PatternFamily::Localized { .. } => {}
    }

    options
}

fn alert_ops_option(hypothesis_confidence: f64) -> InterventionOption {
    InterventionOption {
        kind: InterventionKind::AlertOps,
        target: None,
        duration_ms: 60_000,
        expected_outcome: ExpectedOutcome {
            expected_success_lift: 0.0,
            expected_latency_delta_ms: 0.0,
        },
        tradeoffs: Tradeoffs {
            intervention_cost: 1.0,
            risk_penalty: 0.0,
        },
        reversible: true,
        blast_radius: 0.0,
        hypothesis_confidence,
    }
}

/// Synthesize the baseline `alert_ops` option when no pattern is active but
/// the minimum-action-frequency rule still demands an action this cycle.
pub fn synthesize_baseline_alert_ops() -> InterventionOption {
    alert_ops_option(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_ops_always_present() {
        let options = options_for_pattern(&PatternFamily::Localized { dimension: crate::models::DimensionKey::Global }, 0.4);
        assert!(options.iter().any(|o| o.kind == crate::feedback::InterventionKind::AlertOps));
        assert_eq!(
            options.iter().find(|o| o.kind == crate::feedback::InterventionKind::AlertOps).unwrap().blast_radius,
            0.0
        );
    }

    #[test]
    fn test_issuer_outage_offers_suppress_and_reroute() {
        let options = options_for_pattern(&PatternFamily::IssuerOutage { issuer: Issuer::Icici }, 0.8);
        assert!(options.iter().any(|o| o.kind == crate::feedback::InterventionKind::SuppressPath));
        assert!(options.iter().any(|o| o.kind == crate::feedback::InterventionKind::RerouteTraffic));
    }
}
