//! Event-sourced coordination core for adversarial proof construction
//!
//! This crate provides the state machine under a prover/verifier agent
//! workflow:
//! - Appends typed events to a durable, gap-free, single-writer ledger
//! - Folds events into derived state with full invariant enforcement
//! - Replays the ledger deterministically, optionally verifying content hashes
//! - Classifies pending nodes into prover and verifier jobs
//! - Computes and propagates taint from admitted nodes
//!
//! The ledger owns every entity's lifetime; the in-memory state is a cache
//! and may be rebuilt at any time by replay.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod apply;
pub mod challenge;
pub mod entity;
pub mod error;
pub mod event;
pub mod hash;
pub mod jobs;
pub mod ledger;
pub mod node;
pub mod node_id;
pub mod replay;
pub mod scope;
pub mod state;
pub mod taint;

pub use apply::apply;
pub use challenge::{Challenge, ChallengeAspect, ChallengeStatus, Severity};
pub use entity::{Amendment, Definition, External, Lemma};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use event::{peek_event_type, Event, EventPayload};
pub use hash::compute_node_hash;
pub use jobs::{
    find_expired_claims, find_jobs, find_jobs_in_state, is_prover_job, is_verifier_job, JobResult,
};
pub use ledger::{CasOutcome, Ledger, LedgerConfig};
pub use node::{EpistemicState, Node, NodeType, TaintState, WorkflowState};
pub use node_id::{NodeId, ParseNodeIdError};
pub use replay::{replay, replay_dir, replay_dir_with_verify, replay_with_verify};
pub use scope::{ScopeEntry, ScopeTracker};
pub use state::{ProofHeader, State, StateStats};
pub use taint::recompute_downstream;
