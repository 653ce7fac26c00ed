//! Domain types shared across the agent's subsystems.

pub mod transaction;

pub use transaction::{Issuer, Method, Outcome, Transaction};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// A dimension the agent reasons over: a single issuer, a single payment
/// method, or the global aggregate across all transactions.
///
/// Kept as a closed, tagged enum (rather than a free-form string key) so
/// every dimension-keyed map in the agent (baselines, anomaly flags,
/// pattern matches) is exhaustively handled at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DimensionKey {
    Global,
    Issuer(Issuer),
    Method(Method),
}

impl std::fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DimensionKey::Global => write!(f, "global"),
            DimensionKey::Issuer(issuer) => write!(f, "issuer:{}", issuer),
            DimensionKey::Method(method) => write!(f, "method:{}", method),
        }
    }
}

impl FromStr for DimensionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "global" {
            return Ok(DimensionKey::Global);
        }
        if let Some(name) = s.strip_prefix("issuer:") {
            return issuer_from_display(name)
                .map(DimensionKey::Issuer)
                .ok_or_else(|| format!("unknown issuer in dimension key: {name}"));
        }
        if let Some(name) = s.strip_prefix("method:") {
            return method_from_display(name)
                .map(DimensionKey::Method)
                .ok_or_else(|| format!("unknown method in dimension key: {name}"));
        }
        Err(format!("malformed dimension key: {s}"))
    }
}

fn issuer_from_display(s: &str) -> Option<Issuer> {
    Issuer::ALL.into_iter().find(|i| i.to_string() == s)
}

fn method_from_display(s: &str) -> Option<Method> {
    Method::ALL.into_iter().find(|m| m.to_string() == s)
}

// Serialized/deserialized as its display string (e.g. `"issuer:ICICI"`) so
// that `HashMap<DimensionKey, _>` round-trips through `serde_json` as a
// plain JSON object instead of an array of key/value pairs.
impl Serialize for DimensionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DimensionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
