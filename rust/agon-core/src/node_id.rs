//! Hierarchical node identifiers

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Node id parse failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseNodeIdError {
    #[error("node id is empty")]
    Empty,

    #[error("node id component {0} is empty")]
    EmptyComponent(usize),

    #[error("node id component {0:?} contains a non-digit")]
    NonDigit(String),

    #[error("node id component {0:?} has a leading zero")]
    LeadingZero(String),

    #[error("node id component must be positive")]
    Zero,
}

/// Hierarchical identifier for a proof node, rendered as dot-separated
/// decimal ("1.2.3").
///
/// A non-empty ordered sequence of positive integers. Prefix order gives
/// the ancestor relation; root ids have depth 1. The type is `Hash + Ord`
/// so it serves directly as a map key, and serializes as its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Vec<u32>);

impl NodeId {
    /// Build an id from raw components. Returns `None` for an empty
    /// sequence or a zero component.
    pub fn from_components(components: Vec<u32>) -> Option<Self> {
        if components.is_empty() || components.contains(&0) {
            return None;
        }
        Some(Self(components))
    }

    /// Parse a dotted decimal id.
    ///
    /// Rejects the empty string, empty components, non-digit runs,
    /// leading zeros and the zero component.
    pub fn parse(s: &str) -> Result<Self, ParseNodeIdError> {
        if s.is_empty() {
            return Err(ParseNodeIdError::Empty);
        }
        let mut components = Vec::new();
        for (i, part) in s.split('.').enumerate() {
            if part.is_empty() {
                return Err(ParseNodeIdError::EmptyComponent(i));
            }
            if !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ParseNodeIdError::NonDigit(part.to_string()));
            }
            if part.len() > 1 && part.starts_with('0') {
                return Err(ParseNodeIdError::LeadingZero(part.to_string()));
            }
            let value: u32 = part
                .parse()
                .map_err(|_| ParseNodeIdError::NonDigit(part.to_string()))?;
            if value == 0 {
                return Err(ParseNodeIdError::Zero);
            }
            components.push(value);
        }
        Ok(Self(components))
    }

    /// Raw components in order
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Number of components; root ids have depth 1
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The id with the last component removed; `None` for roots
    pub fn parent(&self) -> Option<NodeId> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// True iff `self` is a strict prefix of `other`
    pub fn is_ancestor_of(&self, other: &NodeId) -> bool {
        self.0.len() < other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Append a child component
    pub fn child(&self, component: u32) -> NodeId {
        let mut components = self.0.clone();
        components.push(component);
        Self(components)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_and_display_roundtrip() {
        let id = NodeId::parse("1.2.3").unwrap();
        assert_eq!(id.components(), &[1, 2, 3]);
        assert_eq!(id.to_string(), "1.2.3");
        assert_eq!(id.depth(), 3);
    }

    #[test_case("" => matches Err(ParseNodeIdError::Empty); "empty string")]
    #[test_case("1..2" => matches Err(ParseNodeIdError::EmptyComponent(1)); "empty component")]
    #[test_case("1.x" => matches Err(ParseNodeIdError::NonDigit(_)); "non digit")]
    #[test_case("1.-2" => matches Err(ParseNodeIdError::NonDigit(_)); "negative")]
    #[test_case("01" => matches Err(ParseNodeIdError::LeadingZero(_)); "leading zero")]
    #[test_case("1.0" => matches Err(ParseNodeIdError::Zero); "zero component")]
    #[test_case("1." => matches Err(ParseNodeIdError::EmptyComponent(1)); "trailing dot")]
    fn test_parse_rejections(s: &str) -> Result<NodeId, ParseNodeIdError> {
        NodeId::parse(s)
    }

    #[test]
    fn test_parent_and_depth() {
        let id = NodeId::parse("1.2.3").unwrap();
        let parent = id.parent().unwrap();
        assert_eq!(parent.to_string(), "1.2");
        assert_eq!(parent.parent().unwrap().to_string(), "1");
        assert!(parent.parent().unwrap().parent().is_none());
    }

    #[test]
    fn test_ancestor_is_strict_prefix() {
        let root = NodeId::parse("1").unwrap();
        let child = NodeId::parse("1.2").unwrap();
        let grandchild = NodeId::parse("1.2.1").unwrap();
        let sibling = NodeId::parse("2").unwrap();

        assert!(root.is_ancestor_of(&child));
        assert!(root.is_ancestor_of(&grandchild));
        assert!(child.is_ancestor_of(&grandchild));
        assert!(!child.is_ancestor_of(&root));
        assert!(!root.is_ancestor_of(&root));
        assert!(!sibling.is_ancestor_of(&child));
        // "1" is not a prefix of "10"
        assert!(!root.is_ancestor_of(&NodeId::parse("10.1").unwrap()));
    }

    #[test]
    fn test_child_append() {
        let id = NodeId::parse("1.2").unwrap();
        assert_eq!(id.child(4).to_string(), "1.2.4");
    }

    #[test]
    fn test_serde_as_string() {
        let id = NodeId::parse("3.1.4").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"3.1.4\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        let bad: Result<NodeId, _> = serde_json::from_str("\"1.0\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_map_key_usable() {
        let mut map = std::collections::HashMap::new();
        map.insert(NodeId::parse("1.1").unwrap(), "a");
        assert_eq!(map.get(&NodeId::parse("1.1").unwrap()), Some(&"a"));
    }
}
