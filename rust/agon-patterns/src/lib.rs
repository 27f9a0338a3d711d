// rust/agon-patterns/src/lib.rs
// Challenge pattern mining for the agon proof workflow
//
// An observer over resolved challenges: classifies each into a recurring
// failure pattern and accumulates a library with occurrence counts. The
// analyzer only reads core state; it has no write path into the ledger.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod analyzer;

pub use analyzer::{analyze, classify, ChallengePattern, PatternKind, PatternLibrary};
