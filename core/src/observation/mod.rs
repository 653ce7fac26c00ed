//! Observation Window & Baseline Manager (component D)
//!
//! The window holds a sliding span of transactions and derives per-dimension
//! aggregate statistics once per cycle; the baseline (see [`baseline`]) tracks
//! a rolling EWMA of those statistics that anomaly detection compares
//! against. The window is the only component permitted to evict
//! transactions or mutate baselines.

pub mod baseline;

pub use baseline::{Baseline, BaselineManager};

use crate::models::{DimensionKey, Issuer, Method, Transaction};
use std::collections::{HashMap, VecDeque};

/// Minimum number of samples in a dimension before anomalies may fire.
pub const MIN_SAMPLE_GATE: usize = 50;

/// Aggregate statistics for one dimension over the current window.
#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionStats {
    pub total: usize,
    pub success_rate: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub avg_retry: f64,
}

/// Sliding window of transactions, evicted on read.
pub struct ObservationWindow {
    window_ms: u64,
    transactions: VecDeque<Transaction>,
}

impl ObservationWindow {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            transactions: VecDeque::new(),
        }
    }

    /// Ingest newly generated transactions (append-only).
    pub fn ingest(&mut self, new_transactions: impl IntoIterator<Item = Transaction>) {
        self.transactions.extend(new_transactions);
    }

    /// Evict everything older than `now_ms - window_ms` and compute
    /// per-dimension aggregates. This is the only place the window is
    /// pruned, and it happens at most once per cycle (on read).
    pub fn refresh(&mut self, now_ms: u64) -> HashMap<DimensionKey, DimensionStats> {
        let cutoff = now_ms.saturating_sub(self.window_ms);
        while let Some(front) = self.transactions.front() {
            if front.timestamp_ms() < cutoff {
                self.transactions.pop_front();
            } else {
                break;
            }
        }

        let mut groups: HashMap<DimensionKey, Vec<&Transaction>> = HashMap::new();
        for tx in &self.transactions {
            groups
                .entry(DimensionKey::Global)
                .or_default()
                .push(tx);
            groups
                .entry(DimensionKey::Issuer(tx.issuer()))
                .or_default()
                .push(tx);
            groups
                .entry(DimensionKey::Method(tx.method()))
                .or_default()
                .push(tx);
        }

        groups
            .into_iter()
            .map(|(key, txs)| (key, compute_stats(&txs)))
            .collect()
    }

    /// Number of transactions currently retained (for diagnostics/tests).
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

fn compute_stats(txs: &[&Transaction]) -> DimensionStats {
    let total = txs.len();
    if total == 0 {
        return DimensionStats::default();
    }
    let successes = txs.iter().filter(|t| t.outcome().is_success()).count();
    let success_rate = successes as f64 / total as f64;

    let mut latencies: Vec<u32> = txs.iter().map(|t| t.latency_ms()).collect();
    latencies.sort_unstable();
    let p50_latency_ms = percentile(&latencies, 0.50);
    let p95_latency_ms = percentile(&latencies, 0.95);
    let p99_latency_ms = percentile(&latencies, 0.99);

    let avg_retry = txs.iter().map(|t| t.retry_count() as f64).sum::<f64>() / total as f64;

    DimensionStats {
        total,
        success_rate,
        p50_latency_ms,
        p95_latency_ms,
        p99_latency_ms,
        avg_retry,
    }
}

fn percentile(sorted: &[u32], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)] as f64
}

/// Convenience: every dimension key the agent tracks for a fixed fleet.
pub fn all_dimension_keys() -> Vec<DimensionKey> {
    let mut keys = vec![DimensionKey::Global];
    keys.extend(Issuer::ALL.iter().map(|&i| DimensionKey::Issuer(i)));
    keys.extend(Method::ALL.iter().map(|&m| DimensionKey::Method(m)));
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Issuer, Method, Outcome};

    fn tx(id: u64, ts: u64, issuer: Issuer, outcome: Outcome, latency: u32) -> Transaction {
        Transaction::new(id, ts, issuer, Method::Upi, outcome, latency, 0, 100)
    }

    #[test]
    fn test_eviction_respects_window() {
        let mut window = ObservationWindow::new(1_000);
        window.ingest(vec![tx(1, 0, Issuer::Hdfc, Outcome::Success, 100)]);
        window.ingest(vec![tx(2, 2_000, Issuer::Hdfc, Outcome::Success, 100)]);
        window.refresh(2_000);
        assert_eq!(window.len(), 1, "first tx should be evicted once past window");
    }

    #[test]
    fn test_global_and_per_issuer_aggregation() {
        let mut window = ObservationWindow::new(10_000);
        window.ingest(vec![
            tx(1, 0, Issuer::Hdfc, Outcome::Success, 100),
            tx(2, 0, Issuer::Icici, Outcome::HardFail, 300),
        ]);
        let stats = window.refresh(0);
        assert_eq!(stats[&DimensionKey::Global].total, 2);
        assert_eq!(stats[&DimensionKey::Issuer(Issuer::Hdfc)].total, 1);
        assert!((stats[&DimensionKey::Issuer(Issuer::Hdfc)].success_rate - 1.0).abs() < 1e-9);
        assert!((stats[&DimensionKey::Issuer(Issuer::Icici)].success_rate - 0.0).abs() < 1e-9);
    }
}
