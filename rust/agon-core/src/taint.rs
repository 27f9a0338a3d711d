//! Taint computation and propagation
//!
//! Four states: unresolved < clean, plus the contagious self_admitted and
//! tainted. Admitting a node makes it self_admitted and taints its already
//! validated descendants; validating a node under a contaminated ancestor
//! yields tainted instead of clean.
//!
//! Ancestry follows the declared dependency edges plus the id-tree parent
//! edge. The dependency graph is recorded faithfully from events and may
//! contain cycles, so every traversal here is a worklist with a visited
//! set.

use crate::error::{CoreError, CoreResult};
use crate::node::{EpistemicState, TaintState};
use crate::node_id::NodeId;
use crate::state::State;
use std::collections::{HashSet, VecDeque};

/// Direct taint ancestors of a node: its dependencies and its id parent
fn direct_ancestors(state: &State, id: &NodeId) -> Vec<NodeId> {
    let mut ancestors = Vec::new();
    if let Some(node) = state.get_node(id) {
        ancestors.extend(node.dependencies.iter().cloned());
    }
    if let Some(parent) = id.parent() {
        if state.get_node(&parent).is_some() {
            ancestors.push(parent);
        }
    }
    ancestors
}

/// Direct taint descendants: nodes that depend on `id` or sit directly
/// under it in the id tree. Ordered by id for deterministic traversal.
fn direct_descendants(state: &State, id: &NodeId) -> Vec<NodeId> {
    let mut descendants: Vec<NodeId> = state
        .all_nodes()
        .into_iter()
        .filter(|n| n.dependencies.contains(id) || n.id.parent().as_ref() == Some(id))
        .map(|n| n.id.clone())
        .collect();
    descendants.sort();
    descendants
}

/// True iff any transitive ancestor of `id` carries a contagious taint
pub(crate) fn has_contaminated_ancestor(state: &State, id: &NodeId) -> bool {
    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(id.clone());
    let mut queue: VecDeque<NodeId> = direct_ancestors(state, id).into();

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(node) = state.get_node(&current) {
            if node.taint.is_contagious() {
                return true;
            }
        }
        queue.extend(direct_ancestors(state, &current));
    }
    false
}

/// Taint assigned to a node at the moment of validation
pub(crate) fn taint_for_validation(state: &State, id: &NodeId) -> TaintState {
    if has_contaminated_ancestor(state, id) {
        TaintState::Tainted
    } else {
        TaintState::Clean
    }
}

/// Taint every already-validated descendant of a freshly admitted node.
///
/// Breadth-first over the descendant relation with a visited set; returns
/// the nodes whose taint changed, in visit order, so the coordinator can
/// persist one taint-recomputed event per change.
pub(crate) fn propagate_admission(state: &mut State, admitted: &NodeId) -> Vec<(NodeId, TaintState)> {
    let mut changed = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    visited.insert(admitted.clone());
    let mut queue: VecDeque<NodeId> = direct_descendants(state, admitted).into();

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(node) = state.node_mut(&current) {
            if node.epistemic == EpistemicState::Validated && node.taint != TaintState::Tainted {
                node.taint = TaintState::Tainted;
                changed.push((current.clone(), TaintState::Tainted));
            }
        }
        queue.extend(direct_descendants(state, &current));
    }
    changed
}

/// Recompute taint for `from` and its transitive descendants from current
/// ancestor states.
///
/// Used after the admission chain changes (an admitted node archived or
/// refuted out of the graph): admitted nodes stay self_admitted, validated
/// nodes become tainted or clean from their ancestors, everything else
/// stays unresolved. Returns the changed set for event emission.
pub fn recompute_downstream(
    state: &mut State,
    from: &NodeId,
) -> CoreResult<Vec<(NodeId, TaintState)>> {
    if state.get_node(from).is_none() {
        return Err(CoreError::not_found("node", from));
    }

    let mut changed = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(from.clone());

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let recomputed = {
            let Some(node) = state.get_node(&current) else {
                continue;
            };
            match node.epistemic {
                EpistemicState::Admitted => TaintState::SelfAdmitted,
                EpistemicState::Validated => taint_for_validation(state, &current),
                _ => node.taint,
            }
        };
        if let Some(node) = state.node_mut(&current) {
            if node.taint != recomputed {
                node.taint = recomputed;
                changed.push((current.clone(), recomputed));
            }
        }
        queue.extend(direct_descendants(state, &current));
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::node::{Node, NodeType};
    use std::collections::HashMap;

    fn id(s: &str) -> NodeId {
        NodeId::parse(s).unwrap()
    }

    /// Build a state with the given (id, dependencies) pairs, all pending
    fn graph(edges: &[(&str, &[&str])]) -> State {
        let mut state = State::new();
        for (node_id, deps) in edges {
            let deps: Vec<NodeId> = deps.iter().map(|d| id(d)).collect();
            let node = Node::new(id(node_id), NodeType::Claim, "stmt")
                .unwrap()
                .with_dependencies(deps);
            insert(&mut state, node);
        }
        state
    }

    fn insert(state: &mut State, node: Node) {
        nodes_mut(state).insert(node.id.clone(), node);
    }

    fn nodes_mut(state: &mut State) -> &mut HashMap<NodeId, Node> {
        &mut state.nodes
    }

    fn set(state: &mut State, node_id: &str, epistemic: EpistemicState, taint: TaintState) {
        let node = state.node_mut(&id(node_id)).unwrap();
        node.epistemic = epistemic;
        node.taint = taint;
    }

    #[test]
    fn test_ancestor_contamination_via_dependency() {
        let mut state = graph(&[("1", &[]), ("2", &["1"]), ("3", &["2"])]);
        assert!(!has_contaminated_ancestor(&state, &id("3")));

        set(&mut state, "1", EpistemicState::Admitted, TaintState::SelfAdmitted);
        assert!(has_contaminated_ancestor(&state, &id("2")));
        assert!(has_contaminated_ancestor(&state, &id("3")));
        assert_eq!(taint_for_validation(&state, &id("3")), TaintState::Tainted);
    }

    #[test]
    fn test_ancestor_contamination_via_id_parent() {
        let mut state = graph(&[("1", &[]), ("1.1", &[])]);
        set(&mut state, "1", EpistemicState::Admitted, TaintState::SelfAdmitted);
        assert!(has_contaminated_ancestor(&state, &id("1.1")));
    }

    #[test]
    fn test_admission_taints_validated_descendants_only() {
        let mut state = graph(&[("1", &[]), ("1.1", &["1"]), ("1.2", &["1"]), ("1.1.1", &["1.1"])]);
        set(&mut state, "1.1", EpistemicState::Validated, TaintState::Clean);
        set(&mut state, "1.1.1", EpistemicState::Validated, TaintState::Clean);
        // 1.2 stays pending

        set(&mut state, "1", EpistemicState::Admitted, TaintState::SelfAdmitted);
        let changed = propagate_admission(&mut state, &id("1"));

        let ids: Vec<String> = changed.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(ids, vec!["1.1", "1.1.1"]);
        assert_eq!(state.get_node(&id("1.1")).unwrap().taint, TaintState::Tainted);
        assert_eq!(state.get_node(&id("1.1.1")).unwrap().taint, TaintState::Tainted);
        assert_eq!(state.get_node(&id("1.2")).unwrap().taint, TaintState::Unresolved);
    }

    #[test]
    fn test_propagation_terminates_on_cycles() {
        // 2 and 3 depend on each other; the visited set must break the loop
        let mut state = graph(&[("1", &[]), ("2", &["1", "3"]), ("3", &["2"])]);
        set(&mut state, "2", EpistemicState::Validated, TaintState::Clean);
        set(&mut state, "3", EpistemicState::Validated, TaintState::Clean);
        set(&mut state, "1", EpistemicState::Admitted, TaintState::SelfAdmitted);

        let changed = propagate_admission(&mut state, &id("1"));
        assert_eq!(changed.len(), 2);
        assert!(has_contaminated_ancestor(&state, &id("2")));
    }

    #[test]
    fn test_recompute_downstream_clears_taint() {
        let mut state = graph(&[("1", &[]), ("2", &["1"]), ("3", &["2"])]);
        set(&mut state, "1", EpistemicState::Admitted, TaintState::SelfAdmitted);
        set(&mut state, "2", EpistemicState::Validated, TaintState::Tainted);
        set(&mut state, "3", EpistemicState::Validated, TaintState::Tainted);

        // 1 leaves the chain: archived nodes are not contagious
        set(&mut state, "1", EpistemicState::Archived, TaintState::Unresolved);
        let changed = recompute_downstream(&mut state, &id("2")).unwrap();

        let ids: Vec<String> = changed.iter().map(|(n, _)| n.to_string()).collect();
        assert_eq!(ids, vec!["2", "3"]);
        assert_eq!(state.get_node(&id("2")).unwrap().taint, TaintState::Clean);
        assert_eq!(state.get_node(&id("3")).unwrap().taint, TaintState::Clean);
    }

    #[test]
    fn test_recompute_downstream_missing_node() {
        let mut state = graph(&[("1", &[])]);
        let err = recompute_downstream(&mut state, &id("9")).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }
}
