//! In-memory derived state and its indices
//!
//! The state is a cache over the ledger: it can be rebuilt at any time by
//! replay and owns nothing. All entity mutation goes through `apply`;
//! external callers read.

use crate::challenge::Challenge;
use crate::entity::{Amendment, Definition, External, Lemma};
use crate::node::{EpistemicState, Node, WorkflowState};
use crate::node_id::NodeId;
use crate::scope::ScopeTracker;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Conjecture header recorded by the proof-initialized event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofHeader {
    pub conjecture: String,
    pub author: String,
    pub initialized_at: DateTime<Utc>,
}

/// Count summary over the current state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStats {
    pub total_nodes: usize,
    pub pending_nodes: usize,
    pub validated_nodes: usize,
    pub admitted_nodes: usize,
    pub refuted_nodes: usize,
    pub archived_nodes: usize,
    pub claimed_nodes: usize,
    pub total_challenges: usize,
    pub open_challenges: usize,
    pub active_scopes: usize,
}

/// The derived in-memory model: by-id maps plus auxiliary indices
#[derive(Debug, Default)]
pub struct State {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) challenges: HashMap<String, Challenge>,
    pub(crate) definitions: HashMap<String, Definition>,
    pub(crate) externals: HashMap<String, External>,
    pub(crate) lemmas: HashMap<String, Lemma>,
    pub(crate) amendments: HashMap<NodeId, Vec<Amendment>>,
    pub(crate) scopes: ScopeTracker,
    pub(crate) header: Option<ProofHeader>,
    pub(crate) latest_seq: u64,
    /// Lazy challenge-by-node index: invalidated on any challenge
    /// mutation, rebuilt on the next read.
    challenge_index: RwLock<Option<HashMap<NodeId, Vec<String>>>>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_challenge(&self, id: &str) -> Option<&Challenge> {
        self.challenges.get(id)
    }

    pub fn get_definition(&self, id: &str) -> Option<&Definition> {
        self.definitions.get(id)
    }

    pub fn get_external(&self, id: &str) -> Option<&External> {
        self.externals.get(id)
    }

    pub fn get_lemma(&self, id: &str) -> Option<&Lemma> {
        self.lemmas.get(id)
    }

    pub fn amendments_for(&self, id: &NodeId) -> &[Amendment] {
        self.amendments.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn scope_tracker(&self) -> &ScopeTracker {
        &self.scopes
    }

    pub fn proof_header(&self) -> Option<&ProofHeader> {
        self.header.as_ref()
    }

    /// Highest applied sequence number; 0 for an empty ledger
    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Record the sequence of the last folded event. Replay maintains this
    /// itself; a coordinator calls it after each successful append+apply
    /// pair so its compare-and-set expectations stay current.
    pub fn set_latest_seq(&mut self, seq: u64) {
        self.latest_seq = seq;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes, ordered by id for a canonical traversal
    pub fn all_nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// All challenges, ordered by id
    pub fn all_challenges(&self) -> Vec<&Challenge> {
        let mut challenges: Vec<&Challenge> = self.challenges.values().collect();
        challenges.sort_by(|a, b| a.id.cmp(&b.id));
        challenges
    }

    pub fn open_challenges(&self) -> Vec<&Challenge> {
        self.all_challenges()
            .into_iter()
            .filter(|ch| ch.is_open())
            .collect()
    }

    /// Challenges targeting `id`, via the lazy index
    pub fn challenges_for_node(&self, id: &NodeId) -> Vec<&Challenge> {
        self.ensure_challenge_index();
        let ids: Vec<String> = {
            let guard = self.challenge_index.read();
            guard
                .as_ref()
                .and_then(|index| index.get(id))
                .cloned()
                .unwrap_or_default()
        };
        ids.iter().filter_map(|cid| self.challenges.get(cid)).collect()
    }

    /// Open challenges with blocking severity (critical or major) on `id`
    pub fn get_blocking_challenges_for_node(&self, id: &NodeId) -> Vec<&Challenge> {
        self.challenges_for_node(id)
            .into_iter()
            .filter(|ch| ch.is_blocking())
            .collect()
    }

    pub fn has_blocking_challenges(&self, id: &NodeId) -> bool {
        !self.get_blocking_challenges_for_node(id).is_empty()
    }

    /// Direct children of `parent` in the id tree, ordered by id
    pub fn children_of(&self, parent: &NodeId) -> Vec<&Node> {
        let mut children: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.id.parent().as_ref() == Some(parent))
            .collect();
        children.sort_by(|a, b| a.id.cmp(&b.id));
        children
    }

    /// True iff every direct child of `parent` is validated; vacuously true
    /// with no children
    pub fn all_children_validated(&self, parent: &NodeId) -> bool {
        self.nodes
            .values()
            .filter(|n| n.id.parent().as_ref() == Some(parent))
            .all(|n| n.epistemic == EpistemicState::Validated)
    }

    pub fn stats(&self) -> StateStats {
        let by_epistemic = |s: EpistemicState| {
            self.nodes.values().filter(|n| n.epistemic == s).count()
        };
        StateStats {
            total_nodes: self.nodes.len(),
            pending_nodes: by_epistemic(EpistemicState::Pending),
            validated_nodes: by_epistemic(EpistemicState::Validated),
            admitted_nodes: by_epistemic(EpistemicState::Admitted),
            refuted_nodes: by_epistemic(EpistemicState::Refuted),
            archived_nodes: by_epistemic(EpistemicState::Archived),
            claimed_nodes: self
                .nodes
                .values()
                .filter(|n| n.workflow == WorkflowState::Claimed)
                .count(),
            total_challenges: self.challenges.len(),
            open_challenges: self.challenges.values().filter(|ch| ch.is_open()).count(),
            active_scopes: self.scopes.active_scopes().len(),
        }
    }

    // ------------------------------------------------------------------
    // Crate-internal mutation (reachable only from apply and the taint
    // engine)
    // ------------------------------------------------------------------

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn challenge_mut(&mut self, id: &str) -> Option<&mut Challenge> {
        self.challenges.get_mut(id)
    }

    /// Drop the lazy index; the next read rebuilds it
    pub(crate) fn invalidate_challenge_index(&self) {
        *self.challenge_index.write() = None;
    }

    fn ensure_challenge_index(&self) {
        let mut guard = self.challenge_index.write();
        if guard.is_some() {
            return;
        }
        let mut index: HashMap<NodeId, Vec<String>> = HashMap::new();
        for ch in self.challenges.values() {
            index
                .entry(ch.target_node.clone())
                .or_default()
                .push(ch.id.clone());
        }
        for ids in index.values_mut() {
            ids.sort();
        }
        *guard = Some(index);
    }
}

impl Clone for State {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            challenges: self.challenges.clone(),
            definitions: self.definitions.clone(),
            externals: self.externals.clone(),
            lemmas: self.lemmas.clone(),
            amendments: self.amendments.clone(),
            scopes: self.scopes.clone(),
            header: self.header.clone(),
            latest_seq: self.latest_seq,
            challenge_index: RwLock::new(None),
        }
    }
}

/// Equality over the semantic content; the lazy index is excluded
impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.challenges == other.challenges
            && self.definitions == other.definitions
            && self.externals == other.externals
            && self.lemmas == other.lemmas
            && self.amendments == other.amendments
            && self.scopes == other.scopes
            && self.header == other.header
            && self.latest_seq == other.latest_seq
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::challenge::{ChallengeAspect, Severity};
    use crate::node::NodeType;

    fn id(s: &str) -> NodeId {
        NodeId::parse(s).unwrap()
    }

    fn seeded_state() -> State {
        let mut state = State::new();
        for node_id in ["1", "1.1", "1.2", "2"] {
            let node = Node::new(id(node_id), NodeType::Claim, "stmt").unwrap();
            state.nodes.insert(node.id.clone(), node);
        }
        let ch = Challenge::new(
            "ch-1",
            id("1.1"),
            ChallengeAspect::Gap,
            "missing step",
            Severity::Critical,
            "v1",
            Utc::now(),
        )
        .unwrap();
        state.challenges.insert(ch.id.clone(), ch);
        state
    }

    #[test]
    fn test_challenge_index_partition() {
        let state = seeded_state();
        assert_eq!(state.challenges_for_node(&id("1.1")).len(), 1);
        assert!(state.challenges_for_node(&id("1")).is_empty());
        assert!(state.has_blocking_challenges(&id("1.1")));
        assert!(!state.has_blocking_challenges(&id("2")));
    }

    #[test]
    fn test_index_invalidation_rebuilds() {
        let mut state = seeded_state();
        // Warm the index, then mutate a challenge and invalidate.
        assert_eq!(state.challenges_for_node(&id("1.1")).len(), 1);
        state
            .challenge_mut("ch-1")
            .unwrap()
            .resolve("added the step")
            .unwrap();
        state.invalidate_challenge_index();

        // Still targeted at 1.1, but no longer blocking.
        assert_eq!(state.challenges_for_node(&id("1.1")).len(), 1);
        assert!(state.get_blocking_challenges_for_node(&id("1.1")).is_empty());
    }

    #[test]
    fn test_children_and_validation_predicate() {
        let mut state = seeded_state();
        assert_eq!(state.children_of(&id("1")).len(), 2);

        // no children: vacuously true
        assert!(state.all_children_validated(&id("2")));

        assert!(!state.all_children_validated(&id("1")));
        for child in ["1.1", "1.2"] {
            state
                .node_mut(&id(child))
                .unwrap()
                .set_epistemic(EpistemicState::Validated)
                .unwrap();
        }
        assert!(state.all_children_validated(&id("1")));
    }

    #[test]
    fn test_all_nodes_canonical_order() {
        let state = seeded_state();
        let ids: Vec<String> = state.all_nodes().iter().map(|n| n.id.to_string()).collect();
        assert_eq!(ids, vec!["1", "1.1", "1.2", "2"]);
    }

    #[test]
    fn test_stats() {
        let state = seeded_state();
        let stats = state.stats();
        assert_eq!(stats.total_nodes, 4);
        assert_eq!(stats.pending_nodes, 4);
        assert_eq!(stats.total_challenges, 1);
        assert_eq!(stats.open_challenges, 1);
    }

    #[test]
    fn test_clone_equality_ignores_index() {
        let state = seeded_state();
        // Warm the original's index; the clone starts cold.
        let _ = state.challenges_for_node(&id("1.1"));
        let cloned = state.clone();
        assert_eq!(state, cloned);
    }
}
