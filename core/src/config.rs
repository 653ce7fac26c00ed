//! Typed configuration tree: one struct per top-level key, loaded from a
//! YAML or JSON file (dispatched by extension) and range-validated against
//! the bounds stated throughout the component design before any component
//! is constructed.

use crate::models::{Issuer, Method};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading or validating a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unrecognized config file extension: {0} (expected .yaml, .yml, or .json)")]
    UnknownExtension(String),
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field {field} = {value} is out of bounds: {bound}")]
    OutOfBounds {
        field: String,
        value: String,
        bound: String,
    },
    #[error("unrecognized issuer name {0:?} in config (expected one of HDFC, ICICI, AXIS, SBI)")]
    UnknownIssuer(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftIssuerOverride {
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub sigma: Option<f64>,
    #[serde(default)]
    pub mean_success: Option<f64>,
    #[serde(default)]
    pub initial_success: Option<f64>,
    #[serde(default)]
    pub initial_latency: Option<f64>,
    #[serde(default)]
    pub initial_retry_prob: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    pub theta: f64,
    pub sigma: f64,
    pub mean_success: f64,
    #[serde(default)]
    pub per_issuer: HashMap<String, DriftIssuerOverride>,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            theta: 0.1,
            sigma: 0.05,
            mean_success: 0.95,
            per_issuer: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerInitialState {
    pub initial_success: f64,
    pub initial_latency: f64,
    pub initial_retry_prob: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneratorConfigSection {
    pub transaction_rate: f64,
    pub buffer_size: usize,
    pub p_soft: f64,
    #[serde(default)]
    pub method_mix: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfigSection {
    pub cycle_interval: u64,
    pub window_duration_ms: u64,
    pub anomaly_threshold: f64,
    pub min_action_frequency_cycles: u32,
    pub min_confidence_for_action: f64,
    pub max_blast_radius_for_autonomy: f64,
}

impl Default for AgentConfigSection {
    fn default() -> Self {
        Self {
            cycle_interval: 10_000,
            window_duration_ms: 60_000,
            anomaly_threshold: 2.0,
            min_action_frequency_cycles: 6,
            min_confidence_for_action: 0.5,
            max_blast_radius_for_autonomy: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfigSection {
    pub time_scale: f64,
    pub duration_seconds: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfigSection {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            duration_seconds: 3600,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryConfig {
    pub port: u16,
}

/// The complete configuration tree, one field per top-level key.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub issuers: HashMap<String, IssuerInitialState>,
    #[serde(default)]
    pub generator: GeneratorConfigSection,
    #[serde(default)]
    pub agent: AgentConfigSection,
    #[serde(default)]
    pub simulation: SimulationConfigSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load from a YAML or JSON file, dispatched by extension, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config: Config = match extension {
            "yaml" | "yml" => serde_yaml::from_str(&raw)?,
            "json" => serde_json::from_str(&raw)?,
            other => return Err(ConfigError::UnknownExtension(other.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate every numeric field against the bounds named in the
    /// component design. Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::check_range("drift.theta", self.drift.theta, 0.0, f64::INFINITY)?;
        Self::check_range("drift.sigma", self.drift.sigma, 0.0, f64::INFINITY)?;
        Self::check_range("drift.mean_success", self.drift.mean_success, 0.0, 1.0)?;

        for (name, state) in &self.issuers {
            if resolve_issuer_name(name).is_none() {
                return Err(ConfigError::UnknownIssuer(name.clone()));
            }
            Self::check_range(
                &format!("issuers.{name}.initial_success"),
                state.initial_success,
                0.0,
                1.0,
            )?;
            Self::check_range(
                &format!("issuers.{name}.initial_latency"),
                state.initial_latency,
                50.0,
                2000.0,
            )?;
            Self::check_range(
                &format!("issuers.{name}.initial_retry_prob"),
                state.initial_retry_prob,
                0.0,
                0.5,
            )?;
        }
        for name in self.drift.per_issuer.keys() {
            if resolve_issuer_name(name).is_none() {
                return Err(ConfigError::UnknownIssuer(name.clone()));
            }
        }

        Self::check_range("generator.transaction_rate", self.generator.transaction_rate, 0.0, f64::INFINITY)?;
        Self::check_range("generator.p_soft", self.generator.p_soft, 0.0, 1.0)?;
        if self.generator.buffer_size == 0 {
            return Err(ConfigError::OutOfBounds {
                field: "generator.buffer_size".to_string(),
                value: "0".to_string(),
                bound: "> 0".to_string(),
            });
        }

        Self::check_range(
            "agent.anomaly_threshold",
            self.agent.anomaly_threshold,
            0.0,
            f64::INFINITY,
        )?;
        Self::check_range(
            "agent.min_confidence_for_action",
            self.agent.min_confidence_for_action,
            0.0,
            1.0,
        )?;
        Self::check_range(
            "agent.max_blast_radius_for_autonomy",
            self.agent.max_blast_radius_for_autonomy,
            0.0,
            1.0,
        )?;
        if self.agent.min_action_frequency_cycles == 0 {
            return Err(ConfigError::OutOfBounds {
                field: "agent.min_action_frequency_cycles".to_string(),
                value: "0".to_string(),
                bound: "> 0".to_string(),
            });
        }

        Self::check_range("simulation.time_scale", self.simulation.time_scale, 0.0, f64::INFINITY)?;

        Ok(())
    }

    fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
        if value < min || value > max {
            return Err(ConfigError::OutOfBounds {
                field: field.to_string(),
                value: value.to_string(),
                bound: format!("[{min}, {max}]"),
            });
        }
        Ok(())
    }
}

/// Resolve a config-file issuer name (e.g. `"ICICI"`) to the closed [`Issuer`]
/// enum. Used by [`Config::validate`] to reject unrecognized issuer keys in
/// `issuers` / `drift.per_issuer` at load time, before any component is
/// constructed.
pub fn resolve_issuer_name(name: &str) -> Option<Issuer> {
    Issuer::ALL.into_iter().find(|i| i.to_string().eq_ignore_ascii_case(name))
}

pub fn resolve_method_name(name: &str) -> Option<Method> {
    Method::ALL.into_iter().find(|m| m.to_string().eq_ignore_ascii_case(name))
}
