//! Challenges raised by verifiers against proof nodes

use crate::error::{CoreError, CoreResult};
use crate::node_id::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aspect of the target node a challenge disputes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeAspect {
    Statement,
    Inference,
    Scope,
    Context,
    Dependencies,
    Gap,
    Other,
}

impl ChallengeAspect {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeAspect::Statement => "statement",
            ChallengeAspect::Inference => "inference",
            ChallengeAspect::Scope => "scope",
            ChallengeAspect::Context => "context",
            ChallengeAspect::Dependencies => "dependencies",
            ChallengeAspect::Gap => "gap",
            ChallengeAspect::Other => "other",
        }
    }
}

/// How serious a challenge is. Critical and major block acceptance and
/// flip the target back into a prover job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Note => "note",
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Critical => "critical",
        }
    }

    /// True for severities that block acceptance of the target node
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Major)
    }
}

/// Lifecycle status of a challenge. Open is the only non-terminal state;
/// resolved, withdrawn and superseded are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Open,
    Resolved,
    Withdrawn,
    Superseded,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Open => "open",
            ChallengeStatus::Resolved => "resolved",
            ChallengeStatus::Withdrawn => "withdrawn",
            ChallengeStatus::Superseded => "superseded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != ChallengeStatus::Open
    }
}

/// A dispute raised against one aspect of a proof node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// Caller-assigned challenge id
    pub id: String,
    /// The node under dispute
    pub target_node: NodeId,
    /// Which aspect is disputed
    pub aspect: ChallengeAspect,
    /// Why the verifier objects
    pub reason: String,
    pub severity: Severity,
    pub status: ChallengeStatus,
    /// Agent that raised the challenge
    pub raised_by: String,
    /// Resolution text, set when resolved
    #[serde(default)]
    pub resolution: Option<String>,
    pub created: DateTime<Utc>,
}

impl Challenge {
    pub fn new(
        id: impl Into<String>,
        target_node: NodeId,
        aspect: ChallengeAspect,
        reason: impl Into<String>,
        severity: Severity,
        raised_by: impl Into<String>,
        created: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(CoreError::NilArgument("challenge_id"));
        }
        Ok(Self {
            id,
            target_node,
            aspect,
            reason: reason.into(),
            severity,
            status: ChallengeStatus::Open,
            raised_by: raised_by.into(),
            resolution: None,
            created,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == ChallengeStatus::Open
    }

    /// Open and severe enough to block the target node
    pub fn is_blocking(&self) -> bool {
        self.is_open() && self.severity.is_blocking()
    }

    /// open -> resolved, recording the resolution text
    pub fn resolve(&mut self, resolution: impl Into<String>) -> CoreResult<()> {
        self.transition_to(ChallengeStatus::Resolved)?;
        self.resolution = Some(resolution.into());
        Ok(())
    }

    /// open -> withdrawn
    pub fn withdraw(&mut self) -> CoreResult<()> {
        self.transition_to(ChallengeStatus::Withdrawn)
    }

    /// open -> superseded (target node archived or refuted)
    pub fn supersede(&mut self) -> CoreResult<()> {
        self.transition_to(ChallengeStatus::Superseded)
    }

    fn transition_to(&mut self, to: ChallengeStatus) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::invalid_transition(
                &self.id,
                self.status.as_str(),
                to.as_str(),
            ));
        }
        self.status = to;
        Ok(())
    }
}
