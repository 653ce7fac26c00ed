//! WebSocket telemetry broadcast: one [`TelemetryFrame`] per cycle, pushed
//! to every connected dashboard client over a `tokio::sync::broadcast`
//! channel. A slow or disconnected client lags and skips frames rather
//! than blocking the control loop -- there is no replay.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// One entry in a [`TelemetryFrame`]'s intervention history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionHistoryEntry {
    pub action: String,
    pub reason: String,
    pub ts: u64,
    pub result: String,
    pub rate: f64,
}

/// Safety/operational metrics surfaced to the dashboard each cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct SafetyMetrics {
    pub false_positive_rate: f64,
    pub avg_response_time_s: f64,
    pub rollback_rate: f64,
    pub human_escalations: u64,
}

/// The one-JSON-object-per-cycle wire shape, exact field names per the
/// telemetry interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub timestamp: u64,
    pub thinking_log: Vec<String>,
    pub total_volume: u64,
    pub fail_rate: f64,
    pub active_gateway: String,
    pub success_series: Vec<f64>,
    pub latency_series: Vec<f64>,
    pub nrv: f64,
    pub confidence: f64,
    pub intervention_history: Vec<InterventionHistoryEntry>,
    pub safety_metrics: SafetyMetrics,
}

#[derive(Clone)]
struct TelemetryState {
    tx: broadcast::Sender<TelemetryFrame>,
}

/// A running telemetry server plus the sender end used to push frames.
pub struct TelemetryServer {
    sender: broadcast::Sender<TelemetryFrame>,
}

impl TelemetryServer {
    /// Bind a WebSocket server on `port` and return a handle for pushing
    /// frames. The server itself runs as a spawned tokio task; dropping the
    /// returned [`TelemetryServer`] does not stop it (matches the generator
    /// thread's fire-and-forget observer role).
    pub async fn bind(port: u16) -> std::io::Result<Self> {
        let (tx, _rx) = broadcast::channel(32);
        let state = TelemetryState { tx: tx.clone() };
        let app = Router::new()
            .route("/telemetry", get(ws_handler))
            .with_state(Arc::new(state));

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                warn!(error = %err, "telemetry server exited");
            }
        });

        Ok(Self { sender: tx })
    }

    /// Broadcast this cycle's frame. Returns the number of clients the
    /// frame was delivered to (0 if nobody is connected); never blocks.
    pub fn publish(&self, frame: TelemetryFrame) -> usize {
        self.sender.send(frame).unwrap_or(0)
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<TelemetryState>>,
) -> impl IntoResponse {
    let rx = state.tx.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(mut socket: WebSocket, mut rx: broadcast::Receiver<TelemetryFrame>) {
    loop {
        match rx.recv().await {
            Ok(frame) => match serde_json::to_string(&frame) {
                Ok(json) => {
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to serialize telemetry frame");
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "telemetry client lagged, skipping frames");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trips_through_json() {
        let frame = TelemetryFrame {
            timestamp: 1_000,
            thinking_log: vec!["observed nothing unusual".to_string()],
            total_volume: 500,
            fail_rate: 0.02,
            active_gateway: "ICICI".to_string(),
            success_series: vec![0.95, 0.96],
            latency_series: vec![200.0, 210.0],
            nrv: 42.0,
            confidence: 0.8,
            intervention_history: vec![],
            safety_metrics: SafetyMetrics::default(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: TelemetryFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_volume, 500);
    }
}
