//! Deterministic replay of a ledger into derived state
//!
//! Replay is pure with respect to the ledger: two replays of the same
//! directory yield equal states. Sequence numbers must be exactly
//! 1, 2, ..., N; any gap or duplicate is fatal and requires ledger repair
//! out of band.

use crate::apply::apply;
use crate::error::{CoreError, CoreResult};
use crate::event::{peek_event_type, Event, EventPayload};
use crate::ledger::{Ledger, LedgerConfig};
use crate::state::State;
use std::path::Path;
use tracing::{error, info};

/// Replay the ledger into a fresh state
pub fn replay(ledger: &Ledger) -> CoreResult<State> {
    replay_inner(ledger, false)
}

/// Replay with content-hash verification of every created node
pub fn replay_with_verify(ledger: &Ledger) -> CoreResult<State> {
    replay_inner(ledger, true)
}

/// Open `dir` read-only and replay it
pub fn replay_dir(dir: impl AsRef<Path>) -> CoreResult<State> {
    let ledger = Ledger::open_read_only(LedgerConfig::new(dir.as_ref()))?;
    replay(&ledger)
}

/// Open `dir` read-only and replay it with hash verification
pub fn replay_dir_with_verify(dir: impl AsRef<Path>) -> CoreResult<State> {
    let ledger = Ledger::open_read_only(LedgerConfig::new(dir.as_ref()))?;
    replay_with_verify(&ledger)
}

fn replay_inner(ledger: &Ledger, verify: bool) -> CoreResult<State> {
    let mut state = State::new();
    let mut expected: u64 = 1;

    ledger.scan(|seq, bytes| {
        if seq > expected {
            return Err(CoreError::SequenceGap {
                expected,
                got: seq,
            });
        }
        if seq < expected {
            return Err(CoreError::SequenceDuplicate {
                expected,
                got: seq,
            });
        }

        let event = parse_event(seq, bytes)?;
        if let Err(err) = apply(&mut state, &event) {
            error!(
                seq,
                event_type = event.type_name(),
                %err,
                "replay aborted: event failed to apply"
            );
            return Err(err);
        }

        if verify {
            if let EventPayload::NodeCreated { node } = &event.payload {
                let computed = node.computed_hash();
                if computed != node.content_hash {
                    return Err(CoreError::HashMismatch {
                        node: node.id.clone(),
                        stored: node.content_hash.clone(),
                        computed,
                    });
                }
            }
        }

        state.set_latest_seq(seq);
        expected += 1;
        Ok(())
    })?;

    info!(
        latest_seq = state.latest_seq(),
        nodes = state.node_count(),
        verify,
        "replay complete"
    );
    Ok(state)
}

/// Parse event bytes, distinguishing an unknown discriminator from
/// malformed JSON so the caller sees the right error kind.
fn parse_event(seq: u64, bytes: &[u8]) -> CoreResult<Event> {
    match serde_json::from_slice(bytes) {
        Ok(event) => Ok(event),
        Err(source) => {
            if let Some(name) = peek_event_type(bytes) {
                if !EventPayload::is_known_type(&name) {
                    return Err(CoreError::UnknownEventType { seq, name });
                }
            }
            Err(CoreError::InvalidJson { seq, source })
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::node::{Node, NodeType};
    use crate::node_id::NodeId;
    use chrono::{DateTime, Utc};

    fn ts() -> DateTime<Utc> {
        "2026-03-01T12:00:00Z".parse().unwrap()
    }

    fn open_temp() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(LedgerConfig::new(dir.path().join("ledger"))).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_empty_ledger_replays_to_empty_state() {
        let (_dir, ledger) = open_temp();
        let state = replay(&ledger).unwrap();
        assert_eq!(state.latest_seq(), 0);
        assert_eq!(state.node_count(), 0);
    }

    #[test]
    fn test_unknown_event_type_surfaced_by_name() {
        let (_dir, ledger) = open_temp();
        let node = Node::new(NodeId::parse("1").unwrap(), NodeType::Root, "r").unwrap();
        ledger
            .append(&Event::at(ts(), EventPayload::NodeCreated { node }))
            .unwrap();
        std::fs::write(
            ledger.event_path(2),
            br#"{"type": "mystery_event", "timestamp": "2026-03-01T12:00:00Z"}"#,
        )
        .unwrap();

        let err = replay(&ledger).unwrap_err();
        match err {
            CoreError::UnknownEventType { seq, name } => {
                assert_eq!(seq, 2);
                assert_eq!(name, "mystery_event");
            }
            other => panic!("expected UnknownEventType, got {other}"),
        }
    }

    #[test]
    fn test_malformed_json_is_invalid_json() {
        let (_dir, ledger) = open_temp();
        std::fs::write(ledger.event_path(1), b"{broken").unwrap();
        let err = replay_dir(ledger.dir()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidJson { seq: 1, .. }));
    }

    #[test]
    fn test_known_type_with_bad_payload_is_invalid_json() {
        let (_dir, ledger) = open_temp();
        std::fs::write(
            ledger.event_path(1),
            br#"{"type": "node_validated", "timestamp": "2026-03-01T12:00:00Z", "node_id": "0.1"}"#,
        )
        .unwrap();
        let err = replay_dir(ledger.dir()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidJson { seq: 1, .. }));
    }
}
