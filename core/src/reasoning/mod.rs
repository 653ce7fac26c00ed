//! Reasoning (component E): anomaly detection, pattern classification, and
//! hypothesis generation. Runs once per cycle against the current window's
//! aggregates and the rolling baselines; stateless except for a small
//! belief cache keyed by dimension (used to track hypothesis confidence
//! across cycles).

pub mod anomaly;
pub mod hypothesis;
pub mod pattern;

pub use anomaly::{AnomalyFlag, Metric};
pub use hypothesis::{Hypothesis, HypothesisEngine};
pub use pattern::PatternFamily;
