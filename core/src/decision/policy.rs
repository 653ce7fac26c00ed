//! The decision policy itself: ranks options by NRV, applies guardrails,
//! and enforces the minimum-action-frequency rule.

use super::nrv::calculate_nrv;
use super::option::{options_for_pattern, synthesize_baseline_alert_ops, InterventionOption};
use crate::feedback::InterventionKind;
use crate::models::Issuer;
use crate::reasoning::PatternFamily;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a single decision, tracked for telemetry/audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    Observe,
    PatternDetected,
    OptionSelected,
    Acting,
    Expired,
    RolledBack,
}

/// Guardrail configuration the policy enforces before acting autonomously.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub max_retry_adjustment: f64,
    pub max_suppression_duration_ms: u64,
    pub max_blast_radius_for_autonomy: f64,
    pub min_confidence_for_action: f64,
    /// Minimum number of consecutive no-action cycles before the
    /// minimum-action-frequency rule forces an action.
    pub min_action_frequency_cycles: u32,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_retry_adjustment: 0.5,
            max_suppression_duration_ms: 600_000,
            max_blast_radius_for_autonomy: 0.4,
            min_confidence_for_action: 0.5,
            min_action_frequency_cycles: 6,
        }
    }
}

/// Why a candidate option was rejected or escalated instead of acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardrailOutcome {
    Allowed,
    RejectedDurationExceedsMax,
    RejectedProtectedTarget,
    EscalatedBlastRadiusAndLowConfidence,
}

/// The outcome of running the policy for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub state: DecisionState,
    pub kind: InterventionKind,
    pub target: Option<Issuer>,
    pub duration_ms: u64,
    pub nrv: f64,
    pub rationale: String,
    pub forced_by_min_frequency: bool,
    pub requires_human_approval: bool,
}

/// Targets the policy will never act on autonomously regardless of NRV.
#[derive(Debug, Clone, Default)]
pub struct ProtectedTargets {
    pub issuers: Vec<Issuer>,
}

/// Holds the minimum-action-frequency counter across cycles and applies
/// guardrails + NRV ranking to produce one [`Decision`] per cycle.
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    guardrails: GuardrailConfig,
    protected: Vec<Issuer>,
    /// Consecutive cycles in which the decision was `no_action`.
    no_action_streak: u32,
}

impl DecisionPolicy {
    pub fn new(guardrails: GuardrailConfig, protected: Vec<Issuer>) -> Self {
        Self {
            guardrails,
            protected,
            no_action_streak: 0,
        }
    }

    /// Restore the policy's frequency counter from a snapshot.
    pub fn restore(guardrails: GuardrailConfig, protected: Vec<Issuer>, no_action_streak: u32) -> Self {
        Self {
            guardrails,
            protected,
            no_action_streak,
        }
    }

    pub fn no_action_streak(&self) -> u32 {
        self.no_action_streak
    }

    /// Run one decision cycle. `patterns` is this cycle's classified
    /// patterns (possibly empty), `hypothesis_confidence` the strongest
    /// hypothesis confidence among them, `avg_ticket_value`/`window_volume`
    /// feed the NRV calculation.
    pub fn decide(
        &mut self,
        patterns: &[PatternFamily],
        hypothesis_confidence: f64,
        avg_ticket_value: f64,
        window_volume: u64,
    ) -> Decision {
        let mut candidates: Vec<InterventionOption> = patterns
            .iter()
            .flat_map(|p| options_for_pattern(p, hypothesis_confidence))
            .collect();

        if candidates.is_empty() {
            // No pattern this cycle. The minimum-action-frequency rule may
            // still force a baseline alert_ops.
            if self.no_action_streak + 1 >= self.guardrails.min_action_frequency_cycles {
                let option = synthesize_baseline_alert_ops();
                self.no_action_streak = 0;
                return Decision {
                    state: DecisionState::Acting,
                    kind: option.kind,
                    target: option.target,
                    duration_ms: option.duration_ms,
                    nrv: 0.0,
                    rationale: "minimum-action-frequency rule forced a baseline alert_ops".into(),
                    forced_by_min_frequency: true,
                    requires_human_approval: false,
                };
            }
            self.no_action_streak += 1;
            return self.no_action_decision();
        }

        candidates.sort_by(|a, b| {
            let nrv_a = calculate_nrv(a, avg_ticket_value, window_volume);
            let nrv_b = calculate_nrv(b, avg_ticket_value, window_volume);
            nrv_b
                .partial_cmp(&nrv_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.reversible.cmp(&a.reversible))
                .then_with(|| a.blast_radius.partial_cmp(&b.blast_radius).unwrap_or(std::cmp::Ordering::Equal))
        });

        // Normal path: act iff the best admissible option's NRV is positive.
        // Guardrail-rejected options never count as "best"; a guardrail
        // escalation does count (it still represents acting, just pending
        // human approval), so it is evaluated in ranked order alongside
        // outright-allowed options.
        for option in &candidates {
            let outcome = self.check_guardrails(option);
            if matches!(
                outcome,
                GuardrailOutcome::RejectedDurationExceedsMax | GuardrailOutcome::RejectedProtectedTarget
            ) {
                continue;
            }

            let nrv = calculate_nrv(option, avg_ticket_value, window_volume);
            if nrv <= 0.0 {
                // Best admissible option doesn't clear the normal-path bar;
                // no lower-ranked option could do better, so stop here.
                break;
            }

            self.no_action_streak = 0;
            return match outcome {
                GuardrailOutcome::EscalatedBlastRadiusAndLowConfidence => Decision {
                    state: DecisionState::OptionSelected,
                    kind: option.kind,
                    target: option.target,
                    duration_ms: option.duration_ms,
                    nrv,
                    rationale: format!(
                        "blast radius {:.2} exceeds autonomy ceiling and confidence {:.2} is below threshold; escalating for human approval",
                        option.blast_radius, option.hypothesis_confidence
                    ),
                    forced_by_min_frequency: false,
                    requires_human_approval: true,
                },
                _ => Decision {
                    state: DecisionState::Acting,
                    kind: option.kind,
                    target: option.target,
                    duration_ms: option.duration_ms,
                    nrv,
                    rationale: format!(
                        "selected {:?} by NRV ranking among {} candidates",
                        option.kind,
                        candidates.len()
                    ),
                    forced_by_min_frequency: false,
                    requires_human_approval: false,
                },
            };
        }

        // Either every candidate was guardrail-rejected, or the best
        // admissible NRV was <= 0. The minimum-action-frequency rule may
        // still force the top-ranked admissible option even at NRV <= 0.
        if self.no_action_streak + 1 >= self.guardrails.min_action_frequency_cycles {
            if let Some(option) = candidates
                .iter()
                .find(|o| !matches!(self.check_guardrails(o), GuardrailOutcome::RejectedDurationExceedsMax | GuardrailOutcome::RejectedProtectedTarget))
            {
                let nrv = calculate_nrv(option, avg_ticket_value, window_volume);
                let requires_human_approval = matches!(
                    self.check_guardrails(option),
                    GuardrailOutcome::EscalatedBlastRadiusAndLowConfidence
                );
                self.no_action_streak = 0;
                return Decision {
                    state: DecisionState::Acting,
                    kind: option.kind,
                    target: option.target,
                    duration_ms: option.duration_ms,
                    nrv,
                    rationale: format!(
                        "minimum-action-frequency rule forced top-ranked option {:?} despite NRV {:.2}",
                        option.kind, nrv
                    ),
                    forced_by_min_frequency: true,
                    requires_human_approval,
                };
            }
            let option = synthesize_baseline_alert_ops();
            self.no_action_streak = 0;
            return Decision {
                state: DecisionState::Acting,
                kind: option.kind,
                target: option.target,
                duration_ms: option.duration_ms,
                nrv: 0.0,
                rationale: "minimum-action-frequency rule forced a baseline alert_ops".into(),
                forced_by_min_frequency: true,
                requires_human_approval: false,
            };
        }

        self.no_action_streak += 1;
        self.no_action_decision()
    }

    fn no_action_decision(&self) -> Decision {
        Decision {
            state: DecisionState::Observe,
            kind: InterventionKind::NoAction,
            target: None,
            duration_ms: 0,
            nrv: 0.0,
            rationale: "no candidate cleared guardrails or no pattern active".into(),
            forced_by_min_frequency: false,
            requires_human_approval: false,
        }
    }

    fn check_guardrails(&self, option: &InterventionOption) -> GuardrailOutcome {
        if option.kind == InterventionKind::SuppressPath
            && option.duration_ms > self.guardrails.max_suppression_duration_ms
        {
            return GuardrailOutcome::RejectedDurationExceedsMax;
        }
        if let Some(target) = option.target {
            if self.protected.contains(&target) && option.kind != InterventionKind::AlertOps {
                return GuardrailOutcome::RejectedProtectedTarget;
            }
        }
        if option.blast_radius > self.guardrails.max_blast_radius_for_autonomy
            && option.hypothesis_confidence < self.guardrails.min_confidence_for_action
        {
            return GuardrailOutcome::EscalatedBlastRadiusAndLowConfidence;
        }
        GuardrailOutcome::Allowed
    }
}
