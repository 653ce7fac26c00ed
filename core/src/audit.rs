//! Append-only audit log: one newline-delimited JSON [`AuditRecord`] per
//! cycle, written to a file kept open for the run's lifetime.

use crate::decision::{Decision, GuardrailOutcome};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to open audit log {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write audit record: {0}")]
    Write(#[from] std::io::Error),
    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One cycle's decision outcome, as written to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub cycle_id: u64,
    pub decision: String,
    pub option: Option<String>,
    pub guardrail_outcome: Option<GuardrailOutcome>,
    pub nrv: f64,
    pub min_freq_triggered: bool,
    pub timestamp_ms: u64,
}

impl AuditRecord {
    pub fn from_decision(cycle_id: u64, decision: &Decision, timestamp_ms: u64) -> Self {
        Self {
            cycle_id,
            decision: format!("{:?}", decision.state),
            option: Some(format!("{:?}", decision.kind)),
            guardrail_outcome: None,
            nrv: decision.nrv,
            min_freq_triggered: decision.forced_by_min_frequency,
            timestamp_ms,
        }
    }

    /// A high-severity record for a rollback that failed to apply, per the
    /// "operator attention required" error-handling rule.
    pub fn rollback_failed(cycle_id: u64, timestamp_ms: u64) -> Self {
        Self {
            cycle_id,
            decision: "rolled_back_failed".to_string(),
            option: None,
            guardrail_outcome: None,
            nrv: 0.0,
            min_freq_triggered: false,
            timestamp_ms,
        }
    }
}

/// Append-only ndjson writer, opened once and kept for the run's lifetime.
pub struct AuditLog {
    writer: BufWriter<File>,
}

impl AuditLog {
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| AuditError::Open {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn append(&mut self, record: &AuditRecord) -> Result<(), AuditError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionState;
    use crate::feedback::InterventionKind;

    #[test]
    fn test_append_writes_valid_ndjson_line() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ops-agent-audit-test-{}.ndjson", std::process::id()));
        let mut log = AuditLog::open(&path).unwrap();
        let decision = Decision {
            state: DecisionState::Acting,
            kind: InterventionKind::AlertOps,
            target: None,
            duration_ms: 60_000,
            nrv: 0.0,
            rationale: "test".to_string(),
            forced_by_min_frequency: true,
            requires_human_approval: false,
        };
        let record = AuditRecord::from_decision(1, &decision, 1_000);
        log.append(&record).unwrap();
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: AuditRecord = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(parsed.cycle_id, 1);
        let _ = std::fs::remove_file(&path);
    }
}
