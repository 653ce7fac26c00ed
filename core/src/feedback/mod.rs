//! Feedback Controller (component B)
//!
//! Tracks every active intervention, exposes the per-issuer multipliers the
//! transaction generator reads, and expires interventions on deadline. This
//! is the component that closes the loop: decisions made by the policy
//! (component F) mutate the parameters the generator (component C) reads.

use crate::models::Issuer;
use serde::{Deserialize, Serialize};

/// The closed set of intervention types the policy can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionKind {
    AdjustRetry,
    SuppressPath,
    RerouteTraffic,
    ReduceRetryAttempts,
    AlertOps,
    NoAction,
}

impl InterventionKind {
    /// Whether this kind targets a specific issuer (vs. being global/no-op).
    pub fn is_issuer_scoped(self) -> bool {
        matches!(
            self,
            InterventionKind::SuppressPath | InterventionKind::RerouteTraffic
        )
    }
}

/// Parameters attached to an intervention when it is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InterventionParameters {
    /// How long the intervention stays active, in milliseconds.
    pub duration_ms: u64,
    /// Magnitude of the intervention (e.g. retry-attempt cap fraction).
    pub magnitude: f64,
}

impl Default for InterventionParameters {
    fn default() -> Self {
        Self {
            duration_ms: 300_000,
            magnitude: 1.0,
        }
    }
}

/// A condition that, if it fires, causes an active intervention to be
/// rolled back before its natural expiry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RollbackCondition {
    /// Global success rate regressed by at least this many percentage
    /// points (in `[0, 1]` units) since the intervention was applied.
    SuccessRateRegression { threshold: f64 },
    /// Manual operator rollback request.
    Manual,
}

/// A live intervention, owned exclusively by the [`FeedbackController`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveIntervention {
    pub kind: InterventionKind,
    pub target: Option<Issuer>,
    pub parameters: InterventionParameters,
    pub start_ms: u64,
    pub end_ms: u64,
    pub rollback_conditions: Vec<RollbackCondition>,
}

impl ActiveIntervention {
    pub fn new(
        kind: InterventionKind,
        target: Option<Issuer>,
        parameters: InterventionParameters,
        start_ms: u64,
        rollback_conditions: Vec<RollbackCondition>,
    ) -> Self {
        let end_ms = start_ms + parameters.duration_ms.max(1);
        debug_assert!(end_ms > start_ms);
        Self {
            kind,
            target,
            parameters,
            start_ms,
            end_ms,
            rollback_conditions,
        }
    }

    fn applies_to(&self, issuer: Issuer) -> bool {
        match self.target {
            Some(t) => t == issuer,
            None => true,
        }
    }
}

/// An intervention that just expired or was withdrawn, handed back to the
/// generator so it can ramp its multipliers back toward 1.0 rather than
/// snapping instantly (per the 30-60s linear ramp requirement).
#[derive(Debug, Clone)]
pub struct RampingIntervention {
    pub kind: InterventionKind,
    pub target: Option<Issuer>,
    pub ramp_start_ms: u64,
    pub ramp_duration_ms: u64,
}

/// Owns the active-intervention list and derives the multipliers the
/// generator applies.
pub struct FeedbackController {
    active: Vec<ActiveIntervention>,
    ramping: Vec<RampingIntervention>,
    ramp_duration_ms: u64,
}

impl FeedbackController {
    pub fn new(ramp_duration_ms: u64) -> Self {
        Self {
            active: Vec::new(),
            ramping: Vec::new(),
            ramp_duration_ms: ramp_duration_ms.clamp(30_000, 60_000),
        }
    }

    /// Restore from a snapshot's active-intervention list.
    pub fn restore(active: Vec<ActiveIntervention>, ramp_duration_ms: u64) -> Self {
        Self {
            active,
            ramping: Vec::new(),
            ramp_duration_ms: ramp_duration_ms.clamp(30_000, 60_000),
        }
    }

    pub fn active_interventions(&self) -> &[ActiveIntervention] {
        &self.active
    }

    /// Apply a newly selected intervention at `now`.
    pub fn apply(
        &mut self,
        kind: InterventionKind,
        target: Option<Issuer>,
        parameters: InterventionParameters,
        now_ms: u64,
        rollback_conditions: Vec<RollbackCondition>,
    ) {
        self.active.push(ActiveIntervention::new(
            kind,
            target,
            parameters,
            now_ms,
            rollback_conditions,
        ));
    }

    /// Drop expired interventions and move them into the ramp-back set.
    /// MUST run before the next generator batch (ordering guarantee in
    /// the agent's concurrency model).
    pub fn tick(&mut self, now_ms: u64) {
        let (expired, still_active): (Vec<_>, Vec<_>) =
            self.active.drain(..).partition(|iv| iv.end_ms <= now_ms);
        self.active = still_active;
        for iv in expired {
            self.ramping.push(RampingIntervention {
                kind: iv.kind,
                target: iv.target,
                ramp_start_ms: now_ms,
                ramp_duration_ms: self.ramp_duration_ms,
            });
        }
        self.ramping
            .retain(|r| now_ms < r.ramp_start_ms + r.ramp_duration_ms);
    }

    /// Force-remove an intervention (rollback), e.g. on sustained
    /// degradation after apply. Returns `true` if an intervention matching
    /// `kind`/`target` was found and removed.
    pub fn rollback(&mut self, kind: InterventionKind, target: Option<Issuer>, now_ms: u64) -> bool {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .active
            .drain(..)
            .partition(|iv| iv.kind == kind && iv.target == target);
        self.active = kept;
        let any_removed = !removed.is_empty();
        for iv in &removed {
            self.ramping.push(RampingIntervention {
                kind: iv.kind,
                target: iv.target,
                ramp_start_ms: now_ms,
                ramp_duration_ms: self.ramp_duration_ms,
            });
        }
        any_removed
    }

    /// Ramp factor in `[0, 1]`: 1.0 means "full suppression strength still
    /// applies", 0.0 means "fully reverted to baseline".
    fn ramp_factor(ramp: &RampingIntervention, now_ms: u64) -> f64 {
        let elapsed = now_ms.saturating_sub(ramp.ramp_start_ms) as f64;
        (1.0 - elapsed / ramp.ramp_duration_ms as f64).clamp(0.0, 1.0)
    }

    /// Product of active `SUPPRESS_PATH` multipliers (x0.1) on `issuer`,
    /// composed with any ramping-back suppression still in effect.
    pub fn success_multiplier(&self, issuer: Issuer, now_ms: u64) -> f64 {
        let mut multiplier = 1.0;
        for iv in &self.active {
            if iv.kind == InterventionKind::SuppressPath && iv.applies_to(issuer) {
                multiplier *= 0.1;
            }
        }
        for ramp in &self.ramping {
            if ramp.kind == InterventionKind::SuppressPath
                && ramp.target.map(|t| t == issuer).unwrap_or(true)
            {
                let f = Self::ramp_factor(ramp, now_ms);
                multiplier *= 0.1 + 0.9 * (1.0 - f);
            }
        }
        multiplier
    }

    /// Product of active volume multipliers on `issuer`: `SUPPRESS_PATH`
    /// x0.1, `REROUTE_TRAFFIC` x0.3, composed with ramp-back.
    pub fn volume_multiplier(&self, issuer: Issuer, now_ms: u64) -> f64 {
        let mut multiplier = 1.0;
        for iv in &self.active {
            if !iv.applies_to(issuer) {
                continue;
            }
            match iv.kind {
                InterventionKind::SuppressPath => multiplier *= 0.1,
                InterventionKind::RerouteTraffic => multiplier *= 0.3,
                _ => {}
            }
        }
        for ramp in &self.ramping {
            if !ramp.target.map(|t| t == issuer).unwrap_or(true) {
                continue;
            }
            let base = match ramp.kind {
                InterventionKind::SuppressPath => 0.1,
                InterventionKind::RerouteTraffic => 0.3,
                _ => continue,
            };
            let f = Self::ramp_factor(ramp, now_ms);
            multiplier *= base + (1.0 - base) * (1.0 - f);
        }
        multiplier
    }

    /// `REDUCE_RETRY_ATTEMPTS` multiplier (x0.5), global (not issuer-scoped).
    pub fn retry_multiplier(&self, now_ms: u64) -> f64 {
        let mut multiplier = 1.0;
        for iv in &self.active {
            if iv.kind == InterventionKind::ReduceRetryAttempts {
                multiplier *= 0.5;
            }
        }
        for ramp in &self.ramping {
            if ramp.kind == InterventionKind::ReduceRetryAttempts {
                let f = Self::ramp_factor(ramp, now_ms);
                multiplier *= 0.5 + 0.5 * (1.0 - f);
            }
        }
        multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppress_path_reduces_both_success_and_volume() {
        let mut fc = FeedbackController::new(30_000);
        fc.apply(
            InterventionKind::SuppressPath,
            Some(Issuer::Icici),
            InterventionParameters {
                duration_ms: 300_000,
                magnitude: 1.0,
            },
            0,
            vec![],
        );
        assert!((fc.success_multiplier(Issuer::Icici, 0) - 0.1).abs() < 1e-9);
        assert!((fc.volume_multiplier(Issuer::Icici, 0) - 0.1).abs() < 1e-9);
        assert!((fc.success_multiplier(Issuer::Hdfc, 0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_expiry_drops_from_active_and_starts_ramp() {
        let mut fc = FeedbackController::new(30_000);
        fc.apply(
            InterventionKind::SuppressPath,
            Some(Issuer::Icici),
            InterventionParameters {
                duration_ms: 1_000,
                magnitude: 1.0,
            },
            0,
            vec![],
        );
        fc.tick(1_000);
        assert!(fc.active_interventions().is_empty());
        // Immediately after expiry the ramp should still be close to full suppression.
        let m = fc.volume_multiplier(Issuer::Icici, 1_000);
        assert!(m < 0.2, "expected still-suppressed at ramp start, got {}", m);
    }

    #[test]
    fn test_ramp_reverts_fully_after_ramp_duration() {
        let mut fc = FeedbackController::new(30_000);
        fc.apply(
            InterventionKind::SuppressPath,
            Some(Issuer::Icici),
            InterventionParameters {
                duration_ms: 1_000,
                magnitude: 1.0,
            },
            0,
            vec![],
        );
        fc.tick(1_000);
        fc.tick(31_000);
        let m = fc.volume_multiplier(Issuer::Icici, 31_000);
        assert!((m - 1.0).abs() < 1e-9, "expected full revert, got {}", m);
    }

    #[test]
    fn test_multiple_interventions_compose_multiplicatively() {
        let mut fc = FeedbackController::new(30_000);
        fc.apply(
            InterventionKind::SuppressPath,
            Some(Issuer::Icici),
            InterventionParameters {
                duration_ms: 300_000,
                magnitude: 1.0,
            },
            0,
            vec![],
        );
        fc.apply(
            InterventionKind::ReduceRetryAttempts,
            None,
            InterventionParameters {
                duration_ms: 300_000,
                magnitude: 1.0,
            },
            0,
            vec![],
        );
        assert!((fc.success_multiplier(Issuer::Icici, 0) - 0.1).abs() < 1e-9);
        assert!((fc.retry_multiplier(0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_rollback_removes_before_natural_expiry() {
        let mut fc = FeedbackController::new(30_000);
        fc.apply(
            InterventionKind::SuppressPath,
            Some(Issuer::Icici),
            InterventionParameters {
                duration_ms: 300_000,
                magnitude: 1.0,
            },
            0,
            vec![],
        );
        let removed = fc.rollback(InterventionKind::SuppressPath, Some(Issuer::Icici), 5_000);
        assert!(removed);
        assert!(fc.active_interventions().is_empty());
    }
}
