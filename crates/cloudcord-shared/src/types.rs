use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Relational primary key of a user record.
///
/// Graph store nodes are keyed by the decimal string form of this id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Node key used by the graph store.
    pub fn to_node_key(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

/// Canonical address of a conversation: the two participants sorted
/// ascending, so `(a, b)` and `(b, a)` produce the same key.
///
/// Serializes as a two element array `["low", "high"]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(from = "(String, String)")]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn low(&self) -> &str {
        &self.0
    }

    pub fn high(&self) -> &str {
        &self.1
    }

    pub fn contains(&self, participant: &str) -> bool {
        self.0 == participant || self.1 == participant
    }
}

impl From<(String, String)> for PairKey {
    fn from((a, b): (String, String)) -> Self {
        Self::new(a, b)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        let ab = PairKey::new("alice", "bob");
        let ba = PairKey::new("bob", "alice");
        assert_eq!(ab, ba);
        assert_eq!(ab.low(), "alice");
        assert_eq!(ab.high(), "bob");
    }

    #[test]
    fn test_pair_key_serializes_sorted() {
        let key = PairKey::new("zed", "amy");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#"["amy","zed"]"#);
    }

    #[test]
    fn test_pair_key_canonicalizes_on_deserialize() {
        let key: PairKey = serde_json::from_str(r#"["zed","amy"]"#).unwrap();
        assert_eq!(key.low(), "amy");
        assert!(key.contains("zed"));
        assert!(!key.contains("bob"));
    }

    #[test]
    fn test_user_id_node_key() {
        let id: UserId = "42".parse().unwrap();
        assert_eq!(id, UserId(42));
        assert_eq!(id.to_node_key(), "42");
        assert!("abc".parse::<UserId>().is_err());
    }
}
