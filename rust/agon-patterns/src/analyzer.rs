// rust/agon-patterns/src/analyzer.rs
// Classification of resolved challenges into recurring failure patterns

use agon_core::{Challenge, ChallengeAspect, ChallengeStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Recurring failure pattern a challenge points at
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// A step is asserted without justification
    LogicalGap,
    /// An assumption is used outside its scope
    ScopeViolation,
    /// The argument assumes what it sets out to prove
    CircularReasoning,
    /// A term is used without a definition in context
    UndefinedTerm,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::LogicalGap => "logical_gap",
            PatternKind::ScopeViolation => "scope_violation",
            PatternKind::CircularReasoning => "circular_reasoning",
            PatternKind::UndefinedTerm => "undefined_term",
        }
    }
}

const CIRCULAR_KEYWORDS: &[&str] = &[
    "circular",
    "circularity",
    "assumes the conclusion",
    "begs the question",
    "self-referential",
];

const UNDEFINED_KEYWORDS: &[&str] = &[
    "undefined",
    "not defined",
    "undeclared",
    "unknown term",
    "missing definition",
];

const SCOPE_KEYWORDS: &[&str] = &[
    "scope",
    "out of scope",
    "assumption leak",
    "discharged",
];

/// Classify a challenge by keyword heuristics over its aspect and reason.
///
/// Precedence: circular reasoning, then undefined terms, then scope
/// violations; everything else is a logical gap.
pub fn classify(aspect: ChallengeAspect, reason: &str) -> PatternKind {
    let reason = reason.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| reason.contains(k));

    if mentions(CIRCULAR_KEYWORDS)
        || (aspect == ChallengeAspect::Dependencies && reason.contains("cycle"))
    {
        PatternKind::CircularReasoning
    } else if mentions(UNDEFINED_KEYWORDS)
        || (aspect == ChallengeAspect::Context && reason.contains("term"))
    {
        PatternKind::UndefinedTerm
    } else if aspect == ChallengeAspect::Scope || mentions(SCOPE_KEYWORDS) {
        PatternKind::ScopeViolation
    } else {
        PatternKind::LogicalGap
    }
}

/// One accumulated pattern with its occurrence count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengePattern {
    pub kind: PatternKind,
    /// Canonical description the pattern is grouped under
    pub description: String,
    pub occurrences: u32,
    /// Ids of the challenges that exhibited the pattern
    pub examples: Vec<String>,
}

/// Library of observed patterns, grouped by (kind, description).
///
/// Serializes as the ordered pattern list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternLibrary {
    patterns: BTreeMap<(PatternKind, String), ChallengePattern>,
}

impl Serialize for PatternLibrary {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.patterns.values())
    }
}

impl<'de> Deserialize<'de> for PatternLibrary {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<ChallengePattern>::deserialize(deserializer)?;
        let mut patterns = BTreeMap::new();
        for pattern in items {
            patterns.insert((pattern.kind, pattern.description.clone()), pattern);
        }
        Ok(Self { patterns })
    }
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one resolved challenge into the library. Open, withdrawn and
    /// superseded challenges are ignored: only resolutions teach us what
    /// the real failure was.
    pub fn ingest(&mut self, challenge: &Challenge) {
        if challenge.status != ChallengeStatus::Resolved {
            return;
        }
        let kind = classify(challenge.aspect, &challenge.reason);
        let description = format!("{} via {} challenge", kind.as_str(), challenge.aspect.as_str());
        let entry = self
            .patterns
            .entry((kind, description.clone()))
            .or_insert_with(|| ChallengePattern {
                kind,
                description,
                occurrences: 0,
                examples: Vec::new(),
            });
        entry.occurrences += 1;
        entry.examples.push(challenge.id.clone());
    }

    /// All patterns in (kind, description) order
    pub fn patterns(&self) -> Vec<&ChallengePattern> {
        self.patterns.values().collect()
    }

    /// Patterns of one kind
    pub fn by_kind(&self, kind: PatternKind) -> Vec<&ChallengePattern> {
        self.patterns
            .values()
            .filter(|p| p.kind == kind)
            .collect()
    }

    /// Total resolved challenges folded in
    pub fn total_occurrences(&self) -> u32 {
        self.patterns.values().map(|p| p.occurrences).sum()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Build a library from a batch of challenges (resolved ones count)
pub fn analyze<'a>(challenges: impl IntoIterator<Item = &'a Challenge>) -> PatternLibrary {
    let mut library = PatternLibrary::new();
    for challenge in challenges {
        library.ingest(challenge);
    }
    library
}
