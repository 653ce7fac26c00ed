//! Payment-fleet autonomous operations agent - core engine
//!
//! A closed-loop control system: a drift engine simulates issuer health, a
//! transaction generator emits outcomes shaped by that health and by active
//! interventions, an observation window and rolling baselines feed a
//! reasoning pipeline that classifies anomalies into patterns and competing
//! hypotheses, and a decision policy ranks candidate interventions by net
//! revenue value before handing the winner to the feedback controller that
//! closes the loop.
//!
//! # Architecture
//!
//! - **drift**: issuer health simulation (component A)
//! - **feedback**: active-intervention tracking and generator multipliers (component B)
//! - **generator**: transaction emission (component C)
//! - **observation**: sliding window + rolling baselines (component D)
//! - **reasoning**: anomaly detection, pattern classification, hypotheses (component E)
//! - **decision**: option generation, NRV ranking, guardrails (component F)
//! - **orchestrator**: tick/cycle loop, snapshotting (component G)
//! - **config**, **context**, **audit**, **telemetry**: ambient stack
//!
//! # Critical invariants
//!
//! 1. All stochastic behaviour goes through [`rng::RngManager`]; independent
//!    subsystems fork labelled sub-streams so reordering never perturbs
//!    another subsystem's sequence.
//! 2. Closed, tagged enums model every dynamic record (outcomes, pattern
//!    families, intervention kinds) rather than free-form strings.
//! 3. Global singletons are replaced by an explicit [`context::Context`]
//!    threaded through component constructors.

pub mod audit;
pub mod config;
pub mod context;
pub mod decision;
pub mod drift;
pub mod feedback;
pub mod generator;
pub mod models;
pub mod observation;
pub mod orchestrator;
pub mod reasoning;
pub mod rng;
pub mod telemetry;
pub mod time;

pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use rng::RngManager;
