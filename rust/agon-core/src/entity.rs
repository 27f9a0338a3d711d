//! Named records reachable by id: definitions, externals, lemmas, amendments

use crate::node_id::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A term definition nodes may cite in their context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    /// Caller-assigned id, e.g. "DEF-group"
    pub id: String,
    /// The term being defined
    pub term: String,
    /// The defining statement
    pub statement: String,
    pub added_by: String,
    pub created: DateTime<Utc>,
}

/// An external result (cited theorem, paper, library fact)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct External {
    /// Caller-assigned id, e.g. "EXT-zorn"
    pub id: String,
    /// Short name of the cited result
    pub name: String,
    /// The statement being imported
    pub statement: String,
    /// Where the result comes from
    #[serde(default)]
    pub source: String,
    pub added_by: String,
    pub created: DateTime<Utc>,
}

/// A lemma extracted from the proof tree for reuse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lemma {
    /// Caller-assigned id, e.g. "LEM-1"
    pub id: String,
    pub name: String,
    pub statement: String,
    /// Node the lemma was lifted from, when known
    #[serde(default)]
    pub extracted_from: Option<NodeId>,
    pub created: DateTime<Utc>,
}

/// One entry in a node's append-only amendment history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amendment {
    pub node_id: NodeId,
    pub prior_statement: String,
    pub new_statement: String,
    pub owner: String,
    pub amended_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_definition_wire_form() {
        let def = Definition {
            id: "DEF-group".to_string(),
            term: "group".to_string(),
            statement: "a set with an associative operation, identity and inverses".to_string(),
            added_by: "prover-1".to_string(),
            created: Utc::now(),
        };
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["id"], "DEF-group");
        assert_eq!(json["term"], "group");
    }

    #[test]
    fn test_lemma_optional_origin() {
        let json = serde_json::json!({
            "id": "LEM-1",
            "name": "closure",
            "statement": "the image is closed",
            "created": "2026-01-01T00:00:00Z",
        });
        let lemma: Lemma = serde_json::from_value(json).unwrap();
        assert!(lemma.extracted_from.is_none());
    }
}
