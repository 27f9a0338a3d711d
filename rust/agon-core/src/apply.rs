//! Event application
//!
//! `apply` is the single point of invariant enforcement: it looks up the
//! referenced entities, validates the transition, and only then mutates
//! state. Each event is all-or-nothing; on any error the state is
//! unchanged and the caller must not persist the event.

use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventPayload};
use crate::node::{EpistemicState, TaintState};
use crate::node_id::NodeId;
use crate::state::{ProofHeader, State};
use crate::taint;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Fold one event into the state, enforcing every semantic invariant
pub fn apply(state: &mut State, event: &Event) -> CoreResult<()> {
    debug!(event_type = event.type_name(), "applying event");
    match &event.payload {
        EventPayload::ProofInitialized { conjecture, author } => {
            apply_proof_initialized(state, conjecture, author, event.timestamp)
        }
        EventPayload::NodeCreated { node } => apply_node_created(state, node),
        EventPayload::NodesClaimed {
            node_ids,
            owner,
            claimed_until,
        } => apply_nodes_claimed(state, node_ids, owner, *claimed_until),
        EventPayload::NodesReleased { node_ids } => apply_nodes_released(state, node_ids),
        EventPayload::ClaimRefreshed {
            node_id,
            claimed_until,
        } => {
            let node = state
                .node_mut(node_id)
                .ok_or_else(|| CoreError::not_found("node", node_id))?;
            node.refresh_claim(*claimed_until)
        }
        EventPayload::LockReaped { node_id } => apply_lock_reaped(state, node_id),
        EventPayload::NodeValidated { node_id } => apply_node_validated(state, node_id),
        EventPayload::NodeAdmitted { node_id } => apply_node_admitted(state, node_id),
        EventPayload::NodeRefuted { node_id } => {
            apply_node_closed(state, node_id, EpistemicState::Refuted)
        }
        EventPayload::NodeArchived { node_id } => {
            apply_node_closed(state, node_id, EpistemicState::Archived)
        }
        EventPayload::NodeAmended {
            node_id,
            new_statement,
            owner,
        } => apply_node_amended(state, node_id, new_statement, owner, event.timestamp),
        EventPayload::ChallengeRaised {
            challenge_id,
            target_node,
            aspect,
            reason,
            severity,
            raised_by,
        } => {
            if state.get_node(target_node).is_none() {
                return Err(CoreError::not_found("node", target_node));
            }
            if state.get_challenge(challenge_id).is_some() {
                return Err(CoreError::invalid_transition(
                    challenge_id,
                    "created",
                    "recreated",
                ));
            }
            let challenge = crate::challenge::Challenge::new(
                challenge_id.clone(),
                target_node.clone(),
                *aspect,
                reason.clone(),
                *severity,
                raised_by.clone(),
                event.timestamp,
            )?;
            state.challenges.insert(challenge.id.clone(), challenge);
            state.invalidate_challenge_index();
            Ok(())
        }
        EventPayload::ChallengeResolved {
            challenge_id,
            resolution,
        } => {
            let challenge = state
                .challenge_mut(challenge_id)
                .ok_or_else(|| CoreError::not_found("challenge", challenge_id))?;
            challenge.resolve(resolution.clone())?;
            state.invalidate_challenge_index();
            Ok(())
        }
        EventPayload::ChallengeWithdrawn { challenge_id } => {
            let challenge = state
                .challenge_mut(challenge_id)
                .ok_or_else(|| CoreError::not_found("challenge", challenge_id))?;
            challenge.withdraw()?;
            state.invalidate_challenge_index();
            Ok(())
        }
        EventPayload::ChallengeSuperseded {
            challenge_id,
            node_id,
        } => {
            let challenge = state
                .challenge_mut(challenge_id)
                .ok_or_else(|| CoreError::not_found("challenge", challenge_id))?;
            if challenge.target_node != *node_id {
                return Err(CoreError::invalid_transition(
                    challenge_id,
                    challenge.target_node.to_string(),
                    node_id.to_string(),
                ));
            }
            challenge.supersede()?;
            state.invalidate_challenge_index();
            Ok(())
        }
        EventPayload::TaintRecomputed { node_id, new_taint } => {
            let node = state
                .node_mut(node_id)
                .ok_or_else(|| CoreError::not_found("node", node_id))?;
            node.taint = *new_taint;
            Ok(())
        }
        EventPayload::DefAdded { definition } => {
            if definition.id.is_empty() {
                return Err(CoreError::NilArgument("definition_id"));
            }
            if state.get_definition(&definition.id).is_some() {
                return Err(CoreError::invalid_transition(
                    &definition.id,
                    "created",
                    "recreated",
                ));
            }
            state
                .definitions
                .insert(definition.id.clone(), definition.clone());
            Ok(())
        }
        EventPayload::ExternalAdded { external } => {
            if external.id.is_empty() {
                return Err(CoreError::NilArgument("external_id"));
            }
            if state.get_external(&external.id).is_some() {
                return Err(CoreError::invalid_transition(
                    &external.id,
                    "created",
                    "recreated",
                ));
            }
            state.externals.insert(external.id.clone(), external.clone());
            Ok(())
        }
        EventPayload::LemmaExtracted { lemma } => {
            if lemma.id.is_empty() {
                return Err(CoreError::NilArgument("lemma_id"));
            }
            if state.get_lemma(&lemma.id).is_some() {
                return Err(CoreError::invalid_transition(
                    &lemma.id,
                    "created",
                    "recreated",
                ));
            }
            state.lemmas.insert(lemma.id.clone(), lemma.clone());
            Ok(())
        }
        EventPayload::ScopeOpened { node_id, statement } => {
            if state.get_node(node_id).is_none() {
                return Err(CoreError::not_found("node", node_id));
            }
            state
                .scopes
                .open_scope(node_id.clone(), statement.clone(), event.timestamp)
        }
        EventPayload::ScopeClosed { node_id } => {
            state.scopes.close_scope(node_id, event.timestamp)
        }
    }
}

fn apply_proof_initialized(
    state: &mut State,
    conjecture: &str,
    author: &str,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    if conjecture.is_empty() {
        return Err(CoreError::NilArgument("conjecture"));
    }
    if state.header.is_some() {
        return Err(CoreError::invalid_transition(
            "proof",
            "initialized",
            "reinitialized",
        ));
    }
    state.header = Some(ProofHeader {
        conjecture: conjecture.to_string(),
        author: author.to_string(),
        initialized_at: at,
    });
    Ok(())
}

fn apply_node_created(state: &mut State, node: &crate::node::Node) -> CoreResult<()> {
    node.validate()?;
    if state.get_node(&node.id).is_some() {
        return Err(CoreError::invalid_transition(&node.id, "created", "recreated"));
    }
    state.nodes.insert(node.id.clone(), node.clone());
    Ok(())
}

fn apply_nodes_claimed(
    state: &mut State,
    node_ids: &[NodeId],
    owner: &str,
    claimed_until: DateTime<Utc>,
) -> CoreResult<()> {
    if node_ids.is_empty() {
        return Err(CoreError::NilArgument("node_ids"));
    }
    if owner.is_empty() {
        return Err(CoreError::NilArgument("owner"));
    }
    // Validate the whole batch before touching any node; a claim is
    // all-or-nothing.
    for id in node_ids {
        let node = state
            .get_node(id)
            .ok_or_else(|| CoreError::not_found("node", id))?;
        if node.workflow != crate::node::WorkflowState::Available {
            return Err(CoreError::invalid_transition(
                id,
                node.workflow.as_str(),
                "claimed",
            ));
        }
    }
    for id in node_ids {
        if let Some(node) = state.node_mut(id) {
            node.claim(owner, claimed_until)?;
        }
    }
    Ok(())
}

fn apply_nodes_released(state: &mut State, node_ids: &[NodeId]) -> CoreResult<()> {
    if node_ids.is_empty() {
        return Err(CoreError::NilArgument("node_ids"));
    }
    for id in node_ids {
        let node = state
            .get_node(id)
            .ok_or_else(|| CoreError::not_found("node", id))?;
        if node.workflow != crate::node::WorkflowState::Claimed {
            return Err(CoreError::invalid_transition(
                id,
                node.workflow.as_str(),
                "available",
            ));
        }
    }
    for id in node_ids {
        if let Some(node) = state.node_mut(id) {
            node.release()?;
        }
    }
    Ok(())
}

fn apply_lock_reaped(state: &mut State, node_id: &NodeId) -> CoreResult<()> {
    let node = state
        .node_mut(node_id)
        .ok_or_else(|| CoreError::not_found("node", node_id))?;
    if node.workflow != crate::node::WorkflowState::Claimed {
        // A reap that raced a voluntary release is benign; the lock is
        // already gone.
        debug!(node = %node_id, "lock reap on unclaimed node ignored");
        return Ok(());
    }
    let owner = node.claimed_by.clone();
    node.release()?;
    warn!(node = %node_id, owner = %owner, "claim reaped after timeout");
    Ok(())
}

fn apply_node_validated(state: &mut State, node_id: &NodeId) -> CoreResult<()> {
    state
        .node_mut(node_id)
        .ok_or_else(|| CoreError::not_found("node", node_id))?
        .set_epistemic(EpistemicState::Validated)?;

    let computed = taint::taint_for_validation(state, node_id);
    if let Some(node) = state.node_mut(node_id) {
        node.taint = computed;
    }
    if computed == TaintState::Tainted {
        warn!(node = %node_id, "validated under a contaminated ancestor");
    }
    Ok(())
}

fn apply_node_admitted(state: &mut State, node_id: &NodeId) -> CoreResult<()> {
    let node = state
        .node_mut(node_id)
        .ok_or_else(|| CoreError::not_found("node", node_id))?;
    node.set_epistemic(EpistemicState::Admitted)?;
    node.taint = TaintState::SelfAdmitted;

    let changed = taint::propagate_admission(state, node_id);
    if !changed.is_empty() {
        warn!(
            node = %node_id,
            tainted = changed.len(),
            "admission tainted validated descendants"
        );
    }
    Ok(())
}

/// Shared path for refuted and archived: epistemic transition plus
/// auto-supersession of every open challenge on the node, atomically.
fn apply_node_closed(state: &mut State, node_id: &NodeId, to: EpistemicState) -> CoreResult<()> {
    state
        .node_mut(node_id)
        .ok_or_else(|| CoreError::not_found("node", node_id))?
        .set_epistemic(to)?;

    let mut superseded = 0usize;
    for challenge in state.challenges.values_mut() {
        if challenge.target_node == *node_id && challenge.is_open() {
            challenge.supersede()?;
            superseded += 1;
        }
    }
    if superseded > 0 {
        state.invalidate_challenge_index();
        warn!(
            node = %node_id,
            count = superseded,
            state = to.as_str(),
            "open challenges superseded"
        );
    }
    Ok(())
}

fn apply_node_amended(
    state: &mut State,
    node_id: &NodeId,
    new_statement: &str,
    owner: &str,
    at: DateTime<Utc>,
) -> CoreResult<()> {
    if new_statement.is_empty() {
        return Err(CoreError::NilArgument("new_statement"));
    }
    let node = state
        .get_node(node_id)
        .ok_or_else(|| CoreError::not_found("node", node_id))?;
    if matches!(
        node.epistemic,
        EpistemicState::Archived | EpistemicState::Refuted
    ) {
        return Err(CoreError::invalid_transition(
            node_id,
            node.epistemic.as_str(),
            "amended",
        ));
    }

    let amendment = crate::entity::Amendment {
        node_id: node_id.clone(),
        prior_statement: node.statement.clone(),
        new_statement: new_statement.to_string(),
        owner: owner.to_string(),
        amended_at: at,
    };
    state
        .amendments
        .entry(node_id.clone())
        .or_default()
        .push(amendment);

    if let Some(node) = state.node_mut(node_id) {
        node.statement = new_statement.to_string();
        node.content_hash = node.computed_hash();
        // Rework submitted: the node goes back in front of the verifiers.
        if node.epistemic == EpistemicState::NeedsRefinement {
            node.set_epistemic(EpistemicState::Pending)?;
        }
    }
    Ok(())
}
