//! Undirected star-to-star edges.
//!
//! # Invariants
//! - Edge identity is the sorted `(from, to)` pair (`EdgeKey`).
//! - Self-loops are never stored.

use super::star::StarId;
use serde::{Deserialize, Serialize};

/// Where an edge came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionOrigin {
    /// Supplied to merge by an external collaborator; survives recluster.
    #[default]
    Supplied,
    /// Synthesized by the connection builder; replaced on every recluster.
    Derived,
}

/// Undirected edge between two stars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: StarId,
    pub to: StarId,
    #[serde(default)]
    pub origin: ConnectionOrigin,
}

impl Connection {
    pub fn new(from: impl Into<StarId>, to: impl Into<StarId>, origin: ConnectionOrigin) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            origin,
        }
    }

    pub fn supplied(from: impl Into<StarId>, to: impl Into<StarId>) -> Self {
        Self::new(from, to, ConnectionOrigin::Supplied)
    }

    pub fn derived(from: impl Into<StarId>, to: impl Into<StarId>) -> Self {
        Self::new(from, to, ConnectionOrigin::Derived)
    }

    /// Canonical undirected key.
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.from, &self.to)
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }

    /// Returns whether either endpoint is `star_id`.
    pub fn touches(&self, star_id: &str) -> bool {
        self.from == star_id || self.to == star_id
    }
}

/// Order-independent identity of an undirected edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    low: StarId,
    high: StarId,
}

impl EdgeKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
        }
    }

    pub fn low(&self) -> &str {
        &self.low
    }

    pub fn high(&self) -> &str {
        &self.high
    }
}

#[cfg(test)]
mod tests {
    use super::{Connection, ConnectionOrigin, EdgeKey};

    #[test]
    fn edge_key_ignores_direction() {
        assert_eq!(EdgeKey::new("star-b", "star-a"), EdgeKey::new("star-a", "star-b"));
        let key = Connection::supplied("star-b", "star-a").key();
        assert_eq!(key.low(), "star-a");
        assert_eq!(key.high(), "star-b");
    }

    #[test]
    fn missing_origin_defaults_to_supplied() {
        let conn: Connection =
            serde_json::from_value(serde_json::json!({"from": "star-a", "to": "star-b"})).unwrap();
        assert_eq!(conn.origin, ConnectionOrigin::Supplied);
    }
}
