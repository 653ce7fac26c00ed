//! Net Revenue Value: the single scalar the decision policy ranks options by.

use super::option::InterventionOption;

/// `NRV = expected_success_lift * avg_ticket_value * window_volume
///        - intervention_cost - latency_penalty - risk_penalty`
///
/// `latency_penalty` is derived from the option's expected latency delta:
/// a positive delta (slower) costs, a negative delta (faster) is free.
pub fn calculate_nrv(option: &InterventionOption, avg_ticket_value: f64, window_volume: u64) -> f64 {
    let revenue_gain =
        option.expected_outcome.expected_success_lift * avg_ticket_value * window_volume as f64;
    let latency_penalty = option.expected_outcome.expected_latency_delta_ms.max(0.0) * 0.01;
    revenue_gain - option.tradeoffs.intervention_cost - latency_penalty - option.tradeoffs.risk_penalty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::option::{ExpectedOutcome, Tradeoffs};
    use crate::feedback::InterventionKind;

    fn option(expected_success_lift: f64, intervention_cost: f64, risk_penalty: f64) -> InterventionOption {
        InterventionOption {
            kind: InterventionKind::SuppressPath,
            target: None,
            duration_ms: 300_000,
            expected_outcome: ExpectedOutcome {
                expected_success_lift,
                expected_latency_delta_ms: 0.0,
            },
            tradeoffs: Tradeoffs {
                intervention_cost,
                risk_penalty,
            },
            reversible: true,
            blast_radius: 0.2,
            hypothesis_confidence: 0.8,
        }
    }

    #[test]
    fn test_higher_success_lift_yields_higher_nrv() {
        let cheap = option(0.1, 10.0, 1.0);
        let strong = option(0.3, 10.0, 1.0);
        assert!(calculate_nrv(&strong, 100.0, 1000) > calculate_nrv(&cheap, 100.0, 1000));
    }

    #[test]
    fn test_higher_cost_lowers_nrv() {
        let base = option(0.2, 10.0, 1.0);
        let costly = option(0.2, 500.0, 1.0);
        assert!(calculate_nrv(&costly, 100.0, 1000) < calculate_nrv(&base, 100.0, 1000));
    }

    #[test]
    fn test_latency_penalty_only_applies_to_positive_delta() {
        let mut slower = option(0.2, 10.0, 1.0);
        slower.expected_outcome.expected_latency_delta_ms = 200.0;
        let mut faster = option(0.2, 10.0, 1.0);
        faster.expected_outcome.expected_latency_delta_ms = -200.0;
        assert!(calculate_nrv(&faster, 100.0, 1000) > calculate_nrv(&slower, 100.0, 1000));
    }
}
