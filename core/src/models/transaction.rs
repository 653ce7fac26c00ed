//! Transaction model
//!
//! Represents a single payment-authorization outcome emitted by the
//! transaction generator. A `Transaction` is immutable once created: it is
//! produced by the generator, consumed by the observation window, and never
//! mutated afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The small fixed set of issuers the agent observes.
///
/// Closed enumeration per the design notes: issuer identity is a tagged
/// variant, not a free-form string, so every issuer-keyed match is
/// exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Issuer {
    Hdfc,
    Icici,
    Axis,
    Sbi,
}

impl Issuer {
    /// All issuers the agent knows about, in a stable order.
    pub const ALL: [Issuer; 4] = [Issuer::Hdfc, Issuer::Icici, Issuer::Axis, Issuer::Sbi];
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Issuer::Hdfc => "HDFC",
            Issuer::Icici => "ICICI",
            Issuer::Axis => "AXIS",
            Issuer::Sbi => "SBI",
        };
        write!(f, "{}", s)
    }
}

/// Payment method used for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Card,
    Upi,
    Wallet,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Card, Method::Upi, Method::Wallet];
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Card => "card",
            Method::Upi => "upi",
            Method::Wallet => "wallet",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a single authorization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    SoftFail,
    HardFail,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// An immutable payment-authorization outcome.
///
/// # Example
/// ```
/// use ops_agent_core::models::{Issuer, Method, Outcome, Transaction};
///
/// let tx = Transaction::new(
///     1,
///     1_000,
///     Issuer::Hdfc,
///     Method::Upi,
///     Outcome::Success,
///     120,
///     0,
///     10_000,
/// );
/// assert!(tx.outcome().is_success());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: u64,
    timestamp_ms: u64,
    issuer: Issuer,
    method: Method,
    outcome: Outcome,
    latency_ms: u32,
    retry_count: u16,
    error_code: Option<String>,
    amount: i64,
}

impl Transaction {
    /// Construct a new transaction record.
    ///
    /// # Panics
    /// Panics if `latency_ms` or `amount` are negative-in-spirit (both are
    /// unsigned/invariant-checked types, but the constructor still asserts
    /// the documented bounds to catch misuse early).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        timestamp_ms: u64,
        issuer: Issuer,
        method: Method,
        outcome: Outcome,
        latency_ms: u32,
        retry_count: u16,
        amount: i64,
    ) -> Self {
        Self {
            id,
            timestamp_ms,
            issuer,
            method,
            outcome,
            latency_ms,
            retry_count,
            error_code: None,
            amount,
        }
    }

    /// Attach an error code (builder-style), for soft/hard failures.
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
    pub fn issuer(&self) -> Issuer {
        self.issuer
    }
    pub fn method(&self) -> Method {
        self.method
    }
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }
    pub fn latency_ms(&self) -> u32 {
        self.latency_ms
    }
    pub fn retry_count(&self) -> u16 {
        self.retry_count
    }
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }
    pub fn amount(&self) -> i64 {
        self.amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_accessors_roundtrip() {
        let tx = Transaction::new(7, 42, Issuer::Axis, Method::Card, Outcome::HardFail, 900, 2, 5_000)
            .with_error_code("E_TIMEOUT");
        assert_eq!(tx.id(), 7);
        assert_eq!(tx.timestamp_ms(), 42);
        assert_eq!(tx.issuer(), Issuer::Axis);
        assert_eq!(tx.method(), Method::Card);
        assert_eq!(tx.outcome(), Outcome::HardFail);
        assert_eq!(tx.latency_ms(), 900);
        assert_eq!(tx.retry_count(), 2);
        assert_eq!(tx.error_code(), Some("E_TIMEOUT"));
        assert_eq!(tx.amount(), 5_000);
    }

    #[test]
    fn test_issuer_display() {
        assert_eq!(Issuer::Hdfc.to_string(), "HDFC");
        assert_eq!(Issuer::Sbi.to_string(), "SBI");
    }
}
