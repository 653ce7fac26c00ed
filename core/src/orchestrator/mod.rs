//! Orchestrator (component G)
//!
//! Drives the loop: at each wall-clock tick it calls the drift engine and
//! transaction generator; every `cycle_interval` it runs the observation ->
//! reasoning -> decision -> feedback pipeline, persists a snapshot, and
//! (optionally) publishes telemetry and appends an audit record. Never
//! resets state between cycles -- a restart resumes exactly where the last
//! snapshot left off.

pub mod checkpoint;

use crate::audit::{AuditLog, AuditRecord};
use crate::config::Config;
use crate::context::Context;
use crate::decision::{Decision, DecisionPolicy, GuardrailConfig};
use crate::drift::{DriftEngine, DriftParams, IssuerState};
use crate::feedback::{FeedbackController, InterventionParameters, RollbackCondition};
use crate::generator::{GeneratorConfig, RateSchedule, TransactionGenerator};
use crate::models::{DimensionKey, Issuer};
use crate::observation::{BaselineManager, ObservationWindow};
use crate::reasoning::{anomaly, hypothesis::DEFAULT_TAU_UNCERTAIN, pattern, HypothesisEngine};
use crate::telemetry::{InterventionHistoryEntry, SafetyMetrics, TelemetryFrame, TelemetryServer};
use crate::time::SimClock;
use checkpoint::{compute_config_hash, read_snapshot, write_snapshot, StateSnapshot};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Counters tracking silently-recovered error paths, surfaced to operators
/// rather than hidden: malformed ingest records dropped, and anomaly checks
/// suppressed for lack of samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataQualityCounters {
    pub dropped_malformed: u64,
    pub dropped_undersampled: u64,
}

/// Everything needed to construct an [`Orchestrator`] from a loaded
/// [`Config`], plus the snapshot/audit file paths the CLI supplies.
pub struct OrchestratorConfig {
    pub config: Config,
    pub snapshot_path: Option<PathBuf>,
    pub audit_log_path: Option<PathBuf>,
    pub protected_issuers: Vec<Issuer>,
}

/// Owns every core component and runs the tick/cycle loop.
pub struct Orchestrator {
    ctx: Context,
    clock: SimClock,
    drift: DriftEngine,
    generator: TransactionGenerator,
    window: ObservationWindow,
    baselines: BaselineManager,
    hypothesis_engine: HypothesisEngine,
    policy: DecisionPolicy,
    feedback: FeedbackController,
    anomaly_threshold: f64,
    avg_ticket_value: f64,
    data_quality: DataQualityCounters,
    snapshot_path: Option<PathBuf>,
    audit_log: Option<AuditLog>,
    telemetry: Option<TelemetryServer>,
    config_hash: String,
    thinking_log: Vec<String>,
    intervention_history: Vec<InterventionHistoryEntry>,
    rollback_count: u64,
    human_escalations: u64,
    last_decision: Option<Decision>,
}

impl Orchestrator {
    /// Build a fresh orchestrator from configuration, restoring from the
    /// snapshot file if one exists and its config hash matches.
    pub fn new(orch_config: OrchestratorConfig) -> Result<Self, checkpoint::SnapshotError> {
        let config = orch_config.config;
        let config_hash = compute_config_hash(&config)?;

        let seed = config.simulation.seed.unwrap_or(0);
        let clock = SimClock::new(100, config.agent.cycle_interval);
        let ctx = Context::new(config.clone(), clock.clone(), seed);

        let mut initial_states = HashMap::new();
        let mut drift_params = HashMap::new();
        for issuer in Issuer::ALL {
            let name = issuer.to_string();
            let override_state = config.issuers.get(&name);
            initial_states.insert(
                issuer,
                IssuerState::new(
                    override_state.map(|s| s.initial_success).unwrap_or(config.drift.mean_success),
                    override_state.map(|s| s.initial_latency).unwrap_or(200.0),
                    override_state.map(|s| s.initial_retry_prob).unwrap_or(0.02),
                ),
            );
            if let Some(over) = config.drift.per_issuer.get(&name) {
                drift_params.insert(
                    issuer,
                    DriftParams {
                        theta: over.theta.unwrap_or(config.drift.theta),
                        sigma: over.sigma.unwrap_or(config.drift.sigma),
                        mean_success: over.mean_success.unwrap_or(config.drift.mean_success),
                    },
                );
            }
        }

        let mut method_mix = HashMap::new();
        for (name, weight) in &config.generator.method_mix {
            if let Some(method) = crate::config::resolve_method_name(name) {
                method_mix.insert(method, *weight);
            }
        }
        if method_mix.is_empty() {
            for method in crate::models::Method::ALL {
                method_mix.insert(method, 1.0);
            }
        }

        let generator_config = GeneratorConfig {
            schedule: RateSchedule::Constant {
                rate_per_sec: config.generator.transaction_rate,
            },
            buffer_size: config.generator.buffer_size,
            p_soft: config.generator.p_soft,
            base_weights: Issuer::ALL.iter().map(|&i| (i, 1.0)).collect(),
            method_mix,
            latency_cv: 0.25,
            max_retries: 10,
        };

        let mut orchestrator = Self {
            drift: DriftEngine::new(initial_states, drift_params, ctx.fork_rng("drift")),
            generator: TransactionGenerator::new(generator_config, ctx.fork_rng("generator")),
            window: ObservationWindow::new(config.agent.window_duration_ms),
            baselines: BaselineManager::new(0.1),
            hypothesis_engine: HypothesisEngine::new(),
            policy: DecisionPolicy::new(
                GuardrailConfig {
                    max_blast_radius_for_autonomy: config.agent.max_blast_radius_for_autonomy,
                    min_confidence_for_action: config.agent.min_confidence_for_action,
                    min_action_frequency_cycles: config.agent.min_action_frequency_cycles,
                    ..GuardrailConfig::default()
                },
                orch_config.protected_issuers,
            ),
            feedback: FeedbackController::new(30_000),
            anomaly_threshold: config.agent.anomaly_threshold,
            avg_ticket_value: 1000.0,
            data_quality: DataQualityCounters::default(),
            snapshot_path: orch_config.snapshot_path.clone(),
            audit_log: None,
            telemetry: None,
            config_hash: config_hash.clone(),
            thinking_log: Vec::new(),
            intervention_history: Vec::new(),
            rollback_count: 0,
            human_escalations: 0,
            last_decision: None,
            clock,
            ctx,
        };

        if let Some(path) = &orch_config.audit_log_path {
            match AuditLog::open(path) {
                Ok(log) => orchestrator.audit_log = Some(log),
                Err(err) => warn!(error = %err, "failed to open audit log, continuing without one"),
            }
        }

        if let Some(path) = &orchestrator.snapshot_path.clone() {
            match read_snapshot(path) {
                Ok(Some(snapshot)) if checkpoint::config_matches(&snapshot, &config_hash) => {
                    orchestrator.restore_from(snapshot);
                }
                Ok(Some(_)) => {
                    warn!("snapshot config hash mismatch, starting from defaults");
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "snapshot read failed on start, starting from defaults");
                }
            }
        }

        Ok(orchestrator)
    }

    fn restore_from(&mut self, snapshot: StateSnapshot) {
        self.clock = SimClock::restore(
            self.clock.tick_ms(),
            self.clock.cycle_interval_ms(),
            snapshot.cycle * self.clock.cycle_interval_ms(),
            snapshot.cycle,
        );
        self.feedback = FeedbackController::restore(snapshot.active_interventions, 30_000);
        self.baselines = BaselineManager::restore(0.1, snapshot.baselines);
        self.policy = DecisionPolicy::restore(
            GuardrailConfig::default(),
            Vec::new(),
            snapshot.no_action_streak,
        );
    }

    /// Attach a telemetry server (created separately since binding is
    /// async); the orchestrator's own tick/cycle loop stays synchronous.
    pub fn with_telemetry(mut self, server: TelemetryServer) -> Self {
        self.telemetry = Some(server);
        self
    }

    /// Advance by one wall-clock tick. Returns `true` if a reasoning/
    /// decision cycle ran this tick.
    pub fn tick(&mut self, dt_ms: u64) -> bool {
        let now_ms = self.clock.now_ms();
        self.drift.update(dt_ms, now_ms);
        let produced = self.generator.generate(now_ms, dt_ms, &self.drift, &self.feedback);
        let buffer = self.generator.buffer();
        let skip = buffer.len().saturating_sub(produced);
        let new_txs: Vec<_> = buffer.iter().skip(skip).cloned().collect();
        self.window.ingest(new_txs);
        self.feedback.tick(self.clock.now_ms());

        let cycle_due = self.clock.advance(dt_ms);
        if cycle_due {
            self.run_cycle();
        }
        cycle_due
    }

    fn run_cycle(&mut self) {
        let now_ms = self.clock.now_ms();
        let cycle = self.clock.cycle_counter();

        let stats = self.window.refresh(now_ms);
        let pre_update_global_mean = self
            .baselines
            .get(&DimensionKey::Global)
            .map(|b| b.success_rate.mean);
        self.baselines.update(&stats);

        self.check_rollback_conditions(&stats, pre_update_global_mean);

        let flags = anomaly::detect_anomalies(&stats, &self.baselines, self.anomaly_threshold);
        self.data_quality.dropped_undersampled += crate::observation::all_dimension_keys()
            .iter()
            .filter(|k| self.baselines.get(k).map(|b| !b.has_min_samples()).unwrap_or(true))
            .count() as u64;

        let patterns = pattern::classify(&flags, &stats, &self.baselines, self.anomaly_threshold);
        let hypothesis_result = self.hypothesis_engine.generate(&patterns, DEFAULT_TAU_UNCERTAIN);
        let max_confidence = hypothesis_result
            .hypotheses
            .iter()
            .map(|h| h.confidence)
            .fold(0.0_f64, f64::max);

        let window_volume = stats.get(&DimensionKey::Global).map(|s| s.total as u64).unwrap_or(0);
        let decision = self
            .policy
            .decide(&patterns, max_confidence, self.avg_ticket_value, window_volume);

        self.apply_decision(&decision, now_ms);

        let mut thinking = vec![format!("cycle {cycle}: {} pattern(s) classified", patterns.len())];
        if hypothesis_result.uncertain {
            thinking.push("uncertain: highest hypothesis confidence below threshold".to_string());
        }
        thinking.push(decision.rationale.clone());
        self.thinking_log = thinking;
        self.last_decision = Some(decision.clone());

        if let Some(log) = &mut self.audit_log {
            let record = AuditRecord::from_decision(cycle, &decision, now_ms);
            if let Err(err) = log.append(&record) {
                warn!(error = %err, "failed to append audit record");
            }
        }

        if let Some(telemetry) = &self.telemetry {
            let frame = self.build_telemetry_frame(&stats, now_ms, &decision, max_confidence);
            telemetry.publish(frame);
        }

        self.persist_snapshot(cycle);
        info!(cycle, pattern_count = patterns.len(), "cycle complete");
    }

    fn apply_decision(&mut self, decision: &Decision, now_ms: u64) {
        use crate::feedback::InterventionKind;
        if decision.kind == InterventionKind::NoAction {
            return;
        }
        if decision.requires_human_approval {
            self.human_escalations += 1;
            return;
        }
        self.feedback.apply(
            decision.kind,
            decision.target,
            InterventionParameters {
                duration_ms: decision.duration_ms,
                magnitude: 1.0,
            },
            now_ms,
            vec![RollbackCondition::SuccessRateRegression { threshold: 0.1 }],
        );
        self.intervention_history.push(InterventionHistoryEntry {
            action: format!("{:?}", decision.kind),
            reason: decision.rationale.clone(),
            ts: now_ms,
            result: "applied".to_string(),
            rate: 0.0,
        });
    }

    /// Evaluate every active intervention's rollback conditions against
    /// this cycle's global stats and roll back any that fire, ahead of
    /// their natural expiry (the `acting -> rolled_back` transition in
    /// the decision state machine). `pre_update_global_mean` is the
    /// global success-rate baseline mean as it stood *before* this
    /// cycle's observation was blended in, so a regression is measured
    /// against the established baseline rather than one already diluted
    /// by the very data point under suspicion.
    fn check_rollback_conditions(
        &mut self,
        stats: &HashMap<DimensionKey, crate::observation::DimensionStats>,
        pre_update_global_mean: Option<f64>,
    ) {
        let Some(baseline_mean) = pre_update_global_mean else {
            return;
        };
        let Some(global) = stats.get(&DimensionKey::Global) else {
            return;
        };
        let regression = baseline_mean - global.success_rate;

        let to_roll_back: Vec<(crate::feedback::InterventionKind, Option<Issuer>)> = self
            .feedback
            .active_interventions()
            .iter()
            .filter(|iv| {
                iv.rollback_conditions.iter().any(|cond| match cond {
                    RollbackCondition::SuccessRateRegression { threshold } => regression >= *threshold,
                    RollbackCondition::Manual => false,
                })
            })
            .map(|iv| (iv.kind, iv.target))
            .collect();

        for (kind, target) in to_roll_back {
            self.rollback(kind, target);
        }
    }

    /// Force-rollback an active intervention ahead of its natural expiry,
    /// e.g. on sustained regression after apply (scenario 5). Records a
    /// high-severity audit entry if the rollback cannot find a match.
    pub fn rollback(&mut self, kind: crate::feedback::InterventionKind, target: Option<Issuer>) {
        let now_ms = self.clock.now_ms();
        let removed = self.feedback.rollback(kind, target, now_ms);
        if removed {
            self.rollback_count += 1;
        } else if let Some(log) = &mut self.audit_log {
            let record = AuditRecord::rollback_failed(self.clock.cycle_counter(), now_ms);
            let _ = log.append(&record);
        }
    }

    fn build_telemetry_frame(
        &self,
        stats: &HashMap<DimensionKey, crate::observation::DimensionStats>,
        now_ms: u64,
        decision: &Decision,
        confidence: f64,
    ) -> TelemetryFrame {
        let global = stats.get(&DimensionKey::Global).copied().unwrap_or_default();
        let success_series: Vec<f64> = Issuer::ALL
            .iter()
            .filter_map(|i| stats.get(&DimensionKey::Issuer(*i)).map(|s| s.success_rate))
            .collect();
        let latency_series: Vec<f64> = Issuer::ALL
            .iter()
            .filter_map(|i| stats.get(&DimensionKey::Issuer(*i)).map(|s| s.p50_latency_ms))
            .collect();
        let active_gateway = decision
            .target
            .map(|i| i.to_string())
            .unwrap_or_else(|| "global".to_string());

        TelemetryFrame {
            timestamp: now_ms,
            thinking_log: self.thinking_log.clone(),
            total_volume: global.total as u64,
            fail_rate: 1.0 - global.success_rate,
            active_gateway,
            success_series,
            latency_series,
            nrv: decision.nrv,
            confidence,
            intervention_history: self.intervention_history.clone(),
            safety_metrics: SafetyMetrics {
                false_positive_rate: 0.0,
                avg_response_time_s: (self.clock.cycle_interval_ms() as f64) / 1000.0,
                rollback_rate: if self.clock.cycle_counter() == 0 {
                    0.0
                } else {
                    self.rollback_count as f64 / self.clock.cycle_counter() as f64
                },
                human_escalations: self.human_escalations,
            },
        }
    }

    fn persist_snapshot(&mut self, cycle: u64) {
        let Some(path) = self.snapshot_path.clone() else {
            return;
        };
        let snapshot = StateSnapshot {
            cycle,
            active_interventions: self.feedback.active_interventions().to_vec(),
            baselines: self.baselines.baselines().clone(),
            rng_seed: self.ctx.config.simulation.seed.unwrap_or(0),
            no_action_streak: self.policy.no_action_streak(),
            config_hash: self.config_hash.clone(),
        };
        if let Err(err) = write_snapshot(&path, &snapshot) {
            warn!(error = %err, "snapshot write failed, keeping in-memory state");
        }
    }

    pub fn data_quality(&self) -> DataQualityCounters {
        self.data_quality
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// The decision produced by the most recently completed cycle, if any.
    pub fn last_decision(&self) -> Option<&Decision> {
        self.last_decision.as_ref()
    }

    /// Number of interventions currently in effect.
    pub fn active_intervention_count(&self) -> usize {
        self.feedback.active_interventions().len()
    }

    pub fn rollback_count(&self) -> u64 {
        self.rollback_count
    }

    pub fn human_escalations(&self) -> u64 {
        self.human_escalations
    }
}
