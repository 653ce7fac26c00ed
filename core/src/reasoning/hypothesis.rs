//! Hypothesis generation: for each active pattern, emit one or more
//! competing root-cause hypotheses with a confidence derived from
//! supporting/contradicting evidence.

use super::pattern::PatternFamily;
use crate::models::DimensionKey;
use std::collections::HashMap;

/// Default confidence threshold below which the belief state is "uncertain".
pub const DEFAULT_TAU_UNCERTAIN: f64 = 0.5;

/// A competing explanation for an observed pattern.
#[derive(Debug, Clone)]
pub struct Hypothesis {
    pub id: u64,
    pub root_cause_tag: String,
    pub confidence: f64,
    pub supporting_evidence: Vec<String>,
    pub contradicting_evidence: Vec<String>,
    pub expected_impact: f64,
}

impl Hypothesis {
    fn new(id: u64, root_cause_tag: impl Into<String>, base_confidence: f64) -> Self {
        Self {
            id,
            root_cause_tag: root_cause_tag.into(),
            confidence: base_confidence.clamp(0.0, 1.0),
            supporting_evidence: Vec::new(),
            contradicting_evidence: Vec::new(),
            expected_impact: 0.0,
        }
    }

    /// Add supporting evidence; confidence rises strictly monotonically.
    pub fn support(mut self, evidence: impl Into<String>, weight: f64) -> Self {
        self.supporting_evidence.push(evidence.into());
        self.confidence = (self.confidence + weight.abs()).clamp(0.0, 1.0);
        self
    }

    /// Add contradicting evidence; confidence falls strictly monotonically.
    pub fn contradict(mut self, evidence: impl Into<String>, weight: f64) -> Self {
        self.contradicting_evidence.push(evidence.into());
        self.confidence = (self.confidence - weight.abs()).clamp(0.0, 1.0);
        self
    }

    pub fn with_expected_impact(mut self, impact: f64) -> Self {
        self.expected_impact = impact;
        self
    }
}

/// Small belief cache keyed by dimension, carried across cycles so
/// confidence trends (not just this cycle's snapshot) are visible. This is
/// the only mutable state E owns; everything else about reasoning is
/// recomputed from scratch each cycle.
#[derive(Debug, Default)]
pub struct HypothesisEngine {
    next_id: u64,
    belief_cache: HashMap<DimensionKey, f64>,
}

/// Result of running hypothesis generation for one cycle.
pub struct HypothesisResult {
    pub hypotheses: Vec<Hypothesis>,
    pub uncertain: bool,
}

impl HypothesisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Generate competing hypotheses for every active pattern this cycle.
    pub fn generate(
        &mut self,
        patterns: &[PatternFamily],
        tau_uncertain: f64,
    ) -> HypothesisResult {
        let mut hypotheses = Vec::new();

        for pattern in patterns {
            hypotheses.extend(self.hypotheses_for_pattern(pattern));
        }

        let max_confidence = hypotheses
            .iter()
            .map(|h| h.confidence)
            .fold(0.0_f64, f64::max);
        let uncertain = max_confidence < tau_uncertain;

        for pattern in patterns {
            let key = dimension_of(pattern);
            self.belief_cache.insert(key, max_confidence);
        }

        HypothesisResult { hypotheses, uncertain }
    }

    fn hypotheses_for_pattern(&mut self, pattern: &PatternFamily) -> Vec<Hypothesis> {
        match pattern {
            PatternFamily::IssuerDegradation { issuer } => vec![
                Hypothesis::new(self.fresh_id(), format!("issuer_side_degradation:{issuer}"), 0.3)
                    .support("single-issuer success Z below threshold", 0.3)
                    .with_expected_impact(0.4),
                Hypothesis::new(self.fresh_id(), format!("gateway_throttling:{issuer}"), 0.2)
                    .support("global success Z weakly negative", 0.15)
                    .contradict("other issuers unaffected", 0.1)
                    .with_expected_impact(0.2),
            ],
            PatternFamily::IssuerOutage { issuer } => vec![
                Hypothesis::new(self.fresh_id(), format!("issuer_outage:{issuer}"), 0.5)
                    .support("absolute success rate below 0.4", 0.3)
                    .with_expected_impact(0.7),
                Hypothesis::new(self.fresh_id(), format!("issuer_maintenance_window:{issuer}"), 0.2)
                    .support("abrupt drop consistent with planned downtime", 0.1)
                    .contradict("no maintenance window on file", 0.15)
                    .with_expected_impact(0.5),
            ],
            PatternFamily::RetryStorm { issuer } => {
                let label = issuer.map(|i| i.to_string()).unwrap_or_else(|| "global".to_string());
                vec![
                    Hypothesis::new(self.fresh_id(), format!("client_side_retry_loop:{label}"), 0.3)
                        .support("retry rate exceeds absolute threshold", 0.25)
                        .with_expected_impact(0.3),
                    Hypothesis::new(self.fresh_id(), format!("issuer_soft_decline_surge:{label}"), 0.3)
                        .support("retry Z above threshold", 0.2)
                        .with_expected_impact(0.35),
                ]
            }
            PatternFamily::MethodFatigue { method } => vec![
                Hypothesis::new(self.fresh_id(), format!("method_specific_issue:{method}"), 0.4)
                    .support("per-method success Z below threshold, issuer-independent", 0.25)
                    .with_expected_impact(0.3),
                Hypothesis::new(self.fresh_id(), format!("upstream_method_provider_incident:{method}"), 0.2)
                    .support("degradation spans multiple issuers on same method", 0.1)
                    .with_expected_impact(0.3),
            ],
            PatternFamily::LatencySpike { dimension } => vec![
                Hypothesis::new(self.fresh_id(), format!("network_path_congestion:{dimension}"), 0.3)
                    .support("latency Z above threshold or p95 above SLA", 0.25)
                    .with_expected_impact(0.2),
                Hypothesis::new(self.fresh_id(), format!("issuer_capacity_saturation:{dimension}"), 0.3)
                    .support("latency increase concentrated on one dimension", 0.2)
                    .with_expected_impact(0.25),
            ],
            PatternFamily::SystemicFailure => vec![
                Hypothesis::new(self.fresh_id(), "shared_infrastructure_incident", 0.6)
                    .support("global success Z below threshold", 0.2)
                    .support("three or more issuers individually flagged", 0.2)
                    .with_expected_impact(0.8),
                Hypothesis::new(self.fresh_id(), "coincident_independent_issuer_incidents", 0.2)
                    .contradict("coincidence across 3+ issuers is statistically unlikely", 0.2)
                    .with_expected_impact(0.6),
            ],
            PatternFamily::Localized { dimension } => vec![Hypothesis::new(
                self.fresh_id(),
                format!("localized_anomaly:{dimension}"),
                0.3,
            )
            .with_expected_impact(0.15)],
        }
    }
}

fn dimension_of(pattern: &PatternFamily) -> DimensionKey {
    match pattern {
        PatternFamily::IssuerDegradation { issuer } | PatternFamily::IssuerOutage { issuer } => {
            DimensionKey::Issuer(*issuer)
        }
        PatternFamily::RetryStorm { issuer } => issuer
            .map(DimensionKey::Issuer)
            .unwrap_or(DimensionKey::Global),
        PatternFamily::MethodFatigue { method } => DimensionKey::Method(*method),
        PatternFamily::LatencySpike { dimension } | PatternFamily::Localized { dimension } => dimension.clone(),
        PatternFamily::SystemicFailure => DimensionKey::Global,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Issuer;

    #[test]
    fn test_issuer_outage_emits_at_least_two_competing_hypotheses() {
        let mut engine = HypothesisEngine::new();
        let patterns = vec![PatternFamily::IssuerOutage { issuer: Issuer::Icici }];
        let result = engine.generate(&patterns, DEFAULT_TAU_UNCERTAIN);
        assert!(result.hypotheses.len() >= 2);
    }

    #[test]
    fn test_confidence_monotonic_with_evidence() {
        let base = Hypothesis::new(0, "test", 0.3);
        let supported = base.clone().support("evidence A", 0.1);
        assert!(supported.confidence > base.confidence);

        let contradicted = supported.clone().contradict("counter-evidence", 0.1);
        assert!(contradicted.confidence < supported.confidence);
    }

    #[test]
    fn test_low_confidence_flags_uncertain() {
        let mut engine = HypothesisEngine::new();
        let patterns = vec![PatternFamily::Localized {
            dimension: DimensionKey::Global,
        }];
        let result = engine.generate(&patterns, DEFAULT_TAU_UNCERTAIN);
        assert!(result.uncertain, "single weak localized hypothesis should be uncertain");
    }
}
