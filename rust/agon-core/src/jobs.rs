//! Job detection
//!
//! Pure classifiers deciding which pending nodes are verifier work and
//! which are prover work, plus the reaper sweep over expired claims.
//! Nothing here mutates state.

use crate::challenge::Challenge;
use crate::node::{EpistemicState, Node, WorkflowState};
use crate::node_id::NodeId;
use crate::state::State;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Classified work, preserving the input node order
#[derive(Debug, Default)]
pub struct JobResult<'a> {
    /// Nodes a prover must address: needs_refinement, or pending with an
    /// open blocking challenge
    pub prover_jobs: Vec<&'a Node>,
    /// Pending nodes ready for review
    pub verifier_jobs: Vec<&'a Node>,
}

/// True iff the node needs prover attention: not blocked, and either sent
/// back for refinement or pending under an open blocking challenge.
pub fn is_prover_job(node: &Node, challenges: &[Challenge]) -> bool {
    if node.workflow == WorkflowState::Blocked {
        return false;
    }
    match node.epistemic {
        EpistemicState::NeedsRefinement => true,
        EpistemicState::Pending => challenges.iter().any(Challenge::is_blocking),
        _ => false,
    }
}

/// True iff the node is ready for verifier review: not blocked, pending,
/// carrying a statement, with no open blocking challenge. Child validation
/// is not required; leaf nodes are legal verifier jobs.
pub fn is_verifier_job(node: &Node, challenges: &[Challenge]) -> bool {
    node.workflow != WorkflowState::Blocked
        && node.epistemic == EpistemicState::Pending
        && !node.statement.is_empty()
        && !challenges.iter().any(Challenge::is_blocking)
}

/// Classify `nodes` into prover and verifier jobs.
///
/// Input order is preserved and the original references are returned. An
/// empty challenge map is treated as "no challenges anywhere".
pub fn find_jobs<'a>(
    nodes: &[&'a Node],
    challenges_by_node: &HashMap<NodeId, Vec<Challenge>>,
) -> JobResult<'a> {
    let mut result = JobResult::default();
    for node in nodes {
        let challenges: &[Challenge] = challenges_by_node
            .get(&node.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        if is_prover_job(node, challenges) {
            result.prover_jobs.push(node);
        } else if is_verifier_job(node, challenges) {
            result.verifier_jobs.push(node);
        }
    }
    result
}

/// Classify every node in the state, in canonical id order
pub fn find_jobs_in_state(state: &State) -> JobResult<'_> {
    let mut result = JobResult::default();
    for node in state.all_nodes() {
        let challenges: Vec<Challenge> = state
            .challenges_for_node(&node.id)
            .into_iter()
            .cloned()
            .collect();
        if is_prover_job(node, &challenges) {
            result.prover_jobs.push(node);
        } else if is_verifier_job(node, &challenges) {
            result.verifier_jobs.push(node);
        }
    }
    result
}

/// Claimed nodes whose timeout has passed, ordered by id. The reaper task
/// turns each into a lock-reaped event.
pub fn find_expired_claims(state: &State, now: DateTime<Utc>) -> Vec<NodeId> {
    let mut expired: Vec<NodeId> = state
        .all_nodes()
        .into_iter()
        .filter(|n| n.is_claim_expired(now))
        .map(|n| n.id.clone())
        .collect();
    expired.sort();
    expired
}
