//! Assumption scope tracking
//!
//! A local assumption opens a scope; nodes inside the scope may rely on the
//! assumption, nodes outside may not. Scopes close when the assumption is
//! discharged. The tracker records open/close history and answers which
//! active scopes contain a given node.

use crate::error::{CoreError, CoreResult};
use crate::node_id::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One assumption scope, active while `closed_at` is unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeEntry {
    /// The local_assume node that opened this scope
    pub assumption_node: NodeId,
    /// The assumed statement
    pub statement: String,
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl ScopeEntry {
    pub fn is_active(&self) -> bool {
        self.closed_at.is_none()
    }
}

/// Open/close bookkeeping for assumption scopes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScopeTracker {
    entries: HashMap<NodeId, ScopeEntry>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope for an assumption node. Opening a node whose scope is
    /// still active is an error; reopening a closed scope replaces it.
    pub fn open_scope(
        &mut self,
        node_id: NodeId,
        statement: impl Into<String>,
        opened_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        if let Some(existing) = self.entries.get(&node_id) {
            if existing.is_active() {
                return Err(CoreError::ScopeError {
                    node: node_id,
                    reason: "scope already open".to_string(),
                });
            }
        }
        self.entries.insert(
            node_id.clone(),
            ScopeEntry {
                assumption_node: node_id,
                statement: statement.into(),
                opened_at,
                closed_at: None,
            },
        );
        Ok(())
    }

    /// Close an active scope. Unknown or already-closed scopes are errors.
    pub fn close_scope(&mut self, node_id: &NodeId, closed_at: DateTime<Utc>) -> CoreResult<()> {
        let entry = self.entries.get_mut(node_id).ok_or_else(|| CoreError::ScopeError {
            node: node_id.clone(),
            reason: "scope was never opened".to_string(),
        })?;
        if !entry.is_active() {
            return Err(CoreError::ScopeError {
                node: node_id.clone(),
                reason: "scope already closed".to_string(),
            });
        }
        entry.closed_at = Some(closed_at);
        Ok(())
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&ScopeEntry> {
        self.entries.get(node_id)
    }

    pub fn is_active(&self, node_id: &NodeId) -> bool {
        self.entries.get(node_id).is_some_and(ScopeEntry::is_active)
    }

    /// All active entries, ordered by assumption node id
    pub fn active_scopes(&self) -> Vec<&ScopeEntry> {
        let mut active: Vec<&ScopeEntry> =
            self.entries.values().filter(|e| e.is_active()).collect();
        active.sort_by(|a, b| a.assumption_node.cmp(&b.assumption_node));
        active
    }

    /// Active scopes containing `node_id`: those whose assumption node is an
    /// ancestor of the node in the id tree, plus those the node declares in
    /// its own scope list.
    pub fn scopes_containing(
        &self,
        node_id: &NodeId,
        declared_scope: &[NodeId],
    ) -> Vec<&ScopeEntry> {
        let mut found: Vec<&ScopeEntry> = self
            .entries
            .values()
            .filter(|e| e.is_active())
            .filter(|e| {
                e.assumption_node.is_ancestor_of(node_id)
                    || declared_scope.contains(&e.assumption_node)
            })
            .collect();
        found.sort_by(|a, b| a.assumption_node.cmp(&b.assumption_node));
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::parse(s).unwrap()
    }

    #[test]
    fn test_open_close_cycle() {
        let mut tracker = ScopeTracker::new();
        tracker.open_scope(id("1.2"), "assume n > 0", Utc::now()).unwrap();
        assert!(tracker.is_active(&id("1.2")));

        // double open while active
        let err = tracker.open_scope(id("1.2"), "again", Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::ScopeError { .. }));

        tracker.close_scope(&id("1.2"), Utc::now()).unwrap();
        assert!(!tracker.is_active(&id("1.2")));

        // double close
        assert!(tracker.close_scope(&id("1.2"), Utc::now()).is_err());
        // closing an unknown scope
        assert!(tracker.close_scope(&id("9"), Utc::now()).is_err());
    }

    #[test]
    fn test_reopen_after_close() {
        let mut tracker = ScopeTracker::new();
        tracker.open_scope(id("1.2"), "assume p", Utc::now()).unwrap();
        tracker.close_scope(&id("1.2"), Utc::now()).unwrap();
        tracker.open_scope(id("1.2"), "assume q", Utc::now()).unwrap();
        assert!(tracker.is_active(&id("1.2")));
        assert_eq!(tracker.get(&id("1.2")).unwrap().statement, "assume q");
    }

    #[test]
    fn test_scopes_containing_by_ancestry() {
        let mut tracker = ScopeTracker::new();
        tracker.open_scope(id("1.2"), "assume p", Utc::now()).unwrap();
        tracker.open_scope(id("3"), "assume q", Utc::now()).unwrap();

        // 1.2.5 sits under the 1.2 assumption, not under 3
        let scopes = tracker.scopes_containing(&id("1.2.5"), &[]);
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].assumption_node, id("1.2"));

        // a node outside both subtrees can still declare a scope
        let scopes = tracker.scopes_containing(&id("4.1"), &[id("3")]);
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0].assumption_node, id("3"));
    }

    #[test]
    fn test_closed_scopes_do_not_contain() {
        let mut tracker = ScopeTracker::new();
        tracker.open_scope(id("1"), "assume p", Utc::now()).unwrap();
        tracker.close_scope(&id("1"), Utc::now()).unwrap();
        assert!(tracker.scopes_containing(&id("1.1"), &[]).is_empty());
        assert!(tracker.active_scopes().is_empty());
    }
}
