//! Typed ledger events and their JSON wire form
//!
//! Every event is a self-describing JSON object: a `type` discriminator, an
//! RFC 3339 `timestamp`, and the variant's named fields in snake_case. The
//! discriminator is the serde tag, so parsing dispatches through the sum
//! type rather than runtime type inspection.

use crate::challenge::{ChallengeAspect, Severity};
use crate::entity::{Definition, External, Lemma};
use crate::node::{Node, TaintState};
use crate::node_id::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ledger event: envelope timestamp plus typed payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// Wrap a payload with the current wall-clock timestamp
    pub fn now(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Wrap a payload with an explicit timestamp (replay fixtures, tests)
    pub fn at(timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self { timestamp, payload }
    }

    /// Wire discriminator of the payload
    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }
}

/// The closed set of event variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Emitted once when a proof effort starts; absent when the repository
    /// was initialized externally
    ProofInitialized { conjecture: String, author: String },
    /// Full node snapshot
    NodeCreated { node: Node },
    /// Batched claim with a shared owner and timeout
    NodesClaimed {
        node_ids: Vec<NodeId>,
        owner: String,
        claimed_until: DateTime<Utc>,
    },
    NodesReleased { node_ids: Vec<NodeId> },
    /// Extends an existing claim
    ClaimRefreshed {
        node_id: NodeId,
        claimed_until: DateTime<Utc>,
    },
    /// Release due to expired timeout
    LockReaped { node_id: NodeId },
    NodeValidated { node_id: NodeId },
    NodeAdmitted { node_id: NodeId },
    NodeRefuted { node_id: NodeId },
    NodeArchived { node_id: NodeId },
    NodeAmended {
        node_id: NodeId,
        new_statement: String,
        owner: String,
    },
    ChallengeRaised {
        challenge_id: String,
        target_node: NodeId,
        aspect: ChallengeAspect,
        reason: String,
        severity: Severity,
        raised_by: String,
    },
    ChallengeResolved {
        challenge_id: String,
        resolution: String,
    },
    ChallengeWithdrawn { challenge_id: String },
    ChallengeSuperseded {
        challenge_id: String,
        node_id: NodeId,
    },
    /// Persists a taint value computed by the taint engine
    TaintRecomputed {
        node_id: NodeId,
        new_taint: TaintState,
    },
    DefAdded { definition: Definition },
    ExternalAdded { external: External },
    LemmaExtracted { lemma: Lemma },
    ScopeOpened {
        node_id: NodeId,
        statement: String,
    },
    ScopeClosed { node_id: NodeId },
}

impl EventPayload {
    /// Wire discriminator
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::ProofInitialized { .. } => "proof_initialized",
            EventPayload::NodeCreated { .. } => "node_created",
            EventPayload::NodesClaimed { .. } => "nodes_claimed",
            EventPayload::NodesReleased { .. } => "nodes_released",
            EventPayload::ClaimRefreshed { .. } => "claim_refreshed",
            EventPayload::LockReaped { .. } => "lock_reaped",
            EventPayload::NodeValidated { .. } => "node_validated",
            EventPayload::NodeAdmitted { .. } => "node_admitted",
            EventPayload::NodeRefuted { .. } => "node_refuted",
            EventPayload::NodeArchived { .. } => "node_archived",
            EventPayload::NodeAmended { .. } => "node_amended",
            EventPayload::ChallengeRaised { .. } => "challenge_raised",
            EventPayload::ChallengeResolved { .. } => "challenge_resolved",
            EventPayload::ChallengeWithdrawn { .. } => "challenge_withdrawn",
            EventPayload::ChallengeSuperseded { .. } => "challenge_superseded",
            EventPayload::TaintRecomputed { .. } => "taint_recomputed",
            EventPayload::DefAdded { .. } => "def_added",
            EventPayload::ExternalAdded { .. } => "external_added",
            EventPayload::LemmaExtracted { .. } => "lemma_extracted",
            EventPayload::ScopeOpened { .. } => "scope_opened",
            EventPayload::ScopeClosed { .. } => "scope_closed",
        }
    }

    /// All wire discriminators the parser accepts
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "proof_initialized",
        "node_created",
        "nodes_claimed",
        "nodes_released",
        "claim_refreshed",
        "lock_reaped",
        "node_validated",
        "node_admitted",
        "node_refuted",
        "node_archived",
        "node_amended",
        "challenge_raised",
        "challenge_resolved",
        "challenge_withdrawn",
        "challenge_superseded",
        "taint_recomputed",
        "def_added",
        "external_added",
        "lemma_extracted",
        "scope_opened",
        "scope_closed",
    ];

    pub fn is_known_type(name: &str) -> bool {
        Self::KNOWN_TYPES.contains(&name)
    }
}

/// Locate the top-level `"type"` member by byte scan, without a full parse.
///
/// Interior quotes in JSON strings are always escaped, so the six-byte
/// pattern `"type"` followed by a colon only occurs as a member key. Used
/// for diagnostics when an event fails to parse.
pub fn peek_event_type(bytes: &[u8]) -> Option<String> {
    const KEY: &[u8] = b"\"type\"";
    let mut at = 0;
    while at + KEY.len() <= bytes.len() {
        let Some(hit) = find(&bytes[at..], KEY) else {
            return None;
        };
        let mut pos = at + hit + KEY.len();
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos < bytes.len() && bytes[pos] == b':' {
            pos += 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos < bytes.len() && bytes[pos] == b'"' {
                let start = pos + 1;
                let end = bytes[start..].iter().position(|&b| b == b'"')? + start;
                return String::from_utf8(bytes[start..end].to_vec()).ok();
            }
        }
        at += hit + KEY.len();
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
