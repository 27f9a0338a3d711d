//! Error types for the coordination core

use crate::node_id::NodeId;
use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Enumerated failure class, for callers that dispatch on the kind of error
/// without destructuring the full payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    UnknownEventType,
    InvalidJson,
    SequenceGap,
    SequenceDuplicate,
    HashMismatch,
    LedgerIo,
    NilArgument,
    ScopeError,
}

/// Closed error taxonomy for the event-sourced core.
///
/// Every variant carries the context a caller needs to act: the offending
/// id, sequence number, or field name. Callers either recover (a CAS
/// conflict is retried at the intent layer) or propagate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced node, challenge, definition, external or lemma is absent
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Illegal workflow, epistemic or challenge-status transition
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// Event type discriminator not present in the registry
    #[error("unknown event type {name:?} at seq {seq}")]
    UnknownEventType { seq: u64, name: String },

    /// Event bytes failed to parse as a known event
    #[error("invalid JSON at seq {seq}: {source}")]
    InvalidJson {
        seq: u64,
        #[source]
        source: serde_json::Error,
    },

    /// Ledger sequence jumped forward during replay
    #[error("sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    /// Ledger sequence repeated or went backwards during replay
    #[error("duplicate sequence: expected {expected}, got {got}")]
    SequenceDuplicate { expected: u64, got: u64 },

    /// Persisted content hash disagrees with the recomputed fingerprint
    #[error("content hash mismatch for node {node}: stored {stored}, computed {computed}")]
    HashMismatch {
        node: NodeId,
        stored: String,
        computed: String,
    },

    /// Filesystem failure in the ledger layer
    #[error("ledger I/O during {op} on {path}: {source}")]
    LedgerIo {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A required argument or field was empty or inconsistent
    #[error("required field {0} is empty or inconsistent")]
    NilArgument(&'static str),

    /// Assumption scope bookkeeping violation
    #[error("scope error for {node}: {reason}")]
    ScopeError { node: NodeId, reason: String },
}

impl CoreError {
    /// The enumerated kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            CoreError::UnknownEventType { .. } => ErrorKind::UnknownEventType,
            CoreError::InvalidJson { .. } => ErrorKind::InvalidJson,
            CoreError::SequenceGap { .. } => ErrorKind::SequenceGap,
            CoreError::SequenceDuplicate { .. } => ErrorKind::SequenceDuplicate,
            CoreError::HashMismatch { .. } => ErrorKind::HashMismatch,
            CoreError::LedgerIo { .. } => ErrorKind::LedgerIo,
            CoreError::NilArgument(_) => ErrorKind::NilArgument,
            CoreError::ScopeError { .. } => ErrorKind::ScopeError,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_transition(
        id: impl ToString,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        CoreError::InvalidTransition {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub(crate) fn ledger_io(op: &'static str, path: &std::path::Path, source: std::io::Error) -> Self {
        CoreError::LedgerIo {
            op,
            path: path.display().to_string(),
            source,
        }
    }
}
