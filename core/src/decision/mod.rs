//! Decision Policy (component F): option generation, NRV-ranked selection,
//! guardrails, and the minimum-action-frequency rule.

pub mod nrv;
pub mod option;
pub mod policy;

pub use nrv::calculate_nrv;
pub use option::{options_for_pattern, synthesize_baseline_alert_ops, ExpectedOutcome, InterventionOption, Tradeoffs};
pub use policy::{Decision, DecisionPolicy, DecisionState, GuardrailConfig, GuardrailOutcome};
