//! `ops-agent` - runs the autonomous fleet-operations agent to completion.
//!
//! Loads configuration, builds the orchestrator, optionally binds the
//! telemetry WebSocket, and drives the tick loop for the configured
//! duration (or until a shutdown signal arrives), persisting state as it
//! goes so a restart resumes exactly where it left off.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use ops_agent_core::config::Config;
use ops_agent_core::orchestrator::{Orchestrator, OrchestratorConfig};
use ops_agent_core::telemetry::TelemetryServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Autonomous payment-fleet operations agent.
#[derive(Parser, Debug)]
#[command(name = "ops-agent", about = "Autonomous payment-fleet operations agent")]
struct Cli {
    /// Path to the YAML or JSON configuration file.
    #[arg(long, value_name = "PATH")]
    config: PathBuf,

    /// How many simulated seconds to run before stopping.
    #[arg(long, value_name = "SECONDS")]
    duration: Option<u64>,

    /// Simulated-time multiplier; overrides `simulation.time_scale`.
    #[arg(long, value_name = "FLOAT")]
    time_scale: Option<f64>,

    /// Path to the persisted-state snapshot file.
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            // Tracing is not initialized yet on a config load failure, so
            // report directly and exit non-zero per the "configuration
            // validation failure" rule.
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let duration_seconds = cli.duration.unwrap_or(config.simulation.duration_seconds);
    let time_scale = cli.time_scale.unwrap_or(config.simulation.time_scale);
    let snapshot_path = cli.snapshot.or_else(|| Some(PathBuf::from("ops-agent-snapshot.json")));

    tracing::info!(
        config = %cli.config.display(),
        duration_seconds,
        time_scale,
        "starting agent"
    );

    let telemetry_port = config.telemetry.port;
    let orch_config = OrchestratorConfig {
        config,
        snapshot_path: snapshot_path.clone(),
        audit_log_path: Some(PathBuf::from("ops-agent-audit.log")),
        protected_issuers: Vec::new(),
    };

    let mut orchestrator =
        Orchestrator::new(orch_config).context("failed to construct orchestrator")?;

    if telemetry_port != 0 {
        match TelemetryServer::bind(telemetry_port).await {
            Ok(server) => {
                tracing::info!(port = telemetry_port, "telemetry server listening");
                orchestrator = orchestrator.with_telemetry(server);
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to bind telemetry server, continuing without it");
            }
        }
    }

    let tick_ms: u64 = (100.0 / time_scale.max(0.001)) as u64;
    let tick_ms = tick_ms.max(1);
    let total_ticks = if duration_seconds == 0 {
        u64::MAX
    } else {
        duration_seconds.saturating_mul(1000) / 100
    };

    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    let mut ticks_run: u64 = 0;

    loop {
        if ticks_run >= total_ticks {
            break;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, finishing current cycle");
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(tick_ms)) => {
                orchestrator.tick(100);
                ticks_run += 1;
            }
        }
    }

    tracing::info!(
        cycles = orchestrator.clock().cycle_counter(),
        "agent stopped"
    );

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    match config.logging.format {
        ops_agent_core::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        ops_agent_core::config::LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}
