//! Persisted-state snapshotting: a JSON file written after every cycle and
//! restored on start, with a SHA-256 config hash guarding against loading a
//! snapshot produced under a different configuration.

use crate::feedback::ActiveIntervention;
use crate::observation::Baseline;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to write snapshot to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read snapshot from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Complete persisted agent state: active interventions, baselines, cycle
/// counter, and the RNG seed, per the external-interface "Persisted state"
/// contract. Unknown top-level fields are ignored on load (forward
/// compatibility, `#[serde(default)]` throughout).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateSnapshot {
    #[serde(default)]
    pub cycle: u64,
    #[serde(default)]
    pub active_interventions: Vec<ActiveIntervention>,
    #[serde(default)]
    pub baselines: std::collections::HashMap<crate::models::DimensionKey, Baseline>,
    #[serde(default)]
    pub rng_seed: u64,
    #[serde(default)]
    pub no_action_streak: u32,
    #[serde(default)]
    pub config_hash: String,
}

/// Deterministic SHA-256 hash of a config, used to validate that a loaded
/// snapshot was produced under the same configuration. Canonicalizes map
/// keys via a `BTreeMap` pass first so `HashMap` iteration order never
/// perturbs the hash.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SnapshotError> {
    let value = serde_json::to_value(config)?;
    let canonical = canonicalize(value);
    let json = serde_json::to_string(&canonical)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn canonicalize(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Write a snapshot atomically: write to a temp file in the same directory
/// then rename over the target, so a crash mid-write never leaves a
/// truncated snapshot for the next start to read.
pub fn write_snapshot(path: &Path, snapshot: &StateSnapshot) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp_path).map_err(|source| SnapshotError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;
        file.write_all(json.as_bytes()).map_err(|source| SnapshotError::Write {
            path: tmp_path.display().to_string(),
            source,
        })?;
    }
    std::fs::rename(&tmp_path, path).map_err(|source| SnapshotError::Write {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Read a snapshot from disk, if present. Returns `Ok(None)` if the file
/// does not exist (fresh start); a parse failure is reported so the caller
/// can fall back to defaults per the "Snapshot read failure on start"
/// error-handling rule.
pub fn read_snapshot(path: &Path) -> Result<Option<StateSnapshot>, SnapshotError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let snapshot: StateSnapshot = serde_json::from_str(&raw)?;
    Ok(Some(snapshot))
}

/// Whether a snapshot's config hash matches the current run's config. A
/// mismatch means the snapshot was produced under a different configuration
/// and must not be blindly trusted.
pub fn config_matches(snapshot: &StateSnapshot, current_config_hash: &str) -> bool {
    snapshot.config_hash == current_config_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_hash_is_stable_regardless_of_map_order() {
        let mut a = std::collections::BTreeMap::new();
        a.insert("b", 2);
        a.insert("a", 1);
        let mut b = std::collections::BTreeMap::new();
        b.insert("a", 1);
        b.insert("b", 2);
        assert_eq!(compute_config_hash(&a).unwrap(), compute_config_hash(&b).unwrap());
    }

    #[test]
    fn test_snapshot_round_trip_through_file() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("ops-agent-snapshot-test-{}.json", std::process::id()));
        let snapshot = StateSnapshot {
            cycle: 7,
            rng_seed: 42,
            config_hash: "abc123".to_string(),
            ..Default::default()
        };
        write_snapshot(&path, &snapshot).unwrap();
        let loaded = read_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded.cycle, 7);
        assert_eq!(loaded.rng_seed, 42);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unknown_extra_field_is_ignored_on_load() {
        // P13: forward-compatibility -- an unknown top-level field must not
        // break deserialization.
        let json = r#"{"cycle": 3, "rng_seed": 9, "config_hash": "x", "future_field": 42}"#;
        let snapshot: StateSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.cycle, 3);
    }

    #[test]
    fn test_missing_file_returns_none() {
        let path = Path::new("/nonexistent/ops-agent-snapshot-does-not-exist.json");
        assert!(read_snapshot(path).unwrap().is_none());
    }
}
