//! Deterministic content fingerprint for proof nodes
//!
//! The fingerprint covers a node's semantic fields only. Workflow and
//! epistemic state are excluded so that claims, validations and taint
//! recomputations never change a node's identity.

use crate::node_id::NodeId;
use sha2::{Digest, Sha256};

/// Separator between scalar fields and between the two array blocks
const FIELD_SEP: [u8; 1] = [0x00];

/// Separator between elements inside an array block
const ITEM_SEP: [u8; 1] = [0x1F];

/// Compute the SHA-256 content hash of a node's semantic fields.
///
/// The byte stream is the four scalar fields separated by `0x00`, followed
/// by the context block and the dependency block, each `0x00`-delimited with
/// elements joined by `0x1F`. Array blocks are lexicographically sorted
/// before joining, so the result is independent of insertion order, and an
/// empty array hashes identically to an absent one.
///
/// Returns 64 lowercase hex characters. Total and infallible; inputs are
/// not modified.
pub fn compute_node_hash(
    node_type: &str,
    statement: &str,
    latex: &str,
    inference: &str,
    context: &[String],
    dependencies: &[NodeId],
) -> String {
    let mut sorted_context: Vec<&str> = context.iter().map(String::as_str).collect();
    sorted_context.sort_unstable();

    let mut sorted_deps: Vec<String> = dependencies.iter().map(NodeId::to_string).collect();
    sorted_deps.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(node_type.as_bytes());
    hasher.update(FIELD_SEP);
    hasher.update(statement.as_bytes());
    hasher.update(FIELD_SEP);
    hasher.update(latex.as_bytes());
    hasher.update(FIELD_SEP);
    hasher.update(inference.as_bytes());
    hasher.update(FIELD_SEP);
    update_joined(&mut hasher, sorted_context.iter().map(|s| s.as_bytes()));
    hasher.update(FIELD_SEP);
    update_joined(&mut hasher, sorted_deps.iter().map(|s| s.as_bytes()));

    hex::encode(hasher.finalize())
}

/// True iff `s` has the shape of a content hash: 64 chars of `[0-9a-f]`
pub fn is_well_formed_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn update_joined<'a>(hasher: &mut Sha256, items: impl Iterator<Item = &'a [u8]>) {
    for (i, item) in items.enumerate() {
        if i > 0 {
            hasher.update(ITEM_SEP);
        }
        hasher.update(item);
    }
}
