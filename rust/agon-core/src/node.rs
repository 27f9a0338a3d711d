//! Proof node model and its workflow / epistemic state machines

use crate::error::{CoreError, CoreResult};
use crate::hash;
use crate::node_id::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structural role of a node in the proof tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Root,
    Claim,
    Step,
    Axiom,
    LocalAssume,
    Definition,
    Case,
}

impl NodeType {
    /// Wire name, also the value hashed into the content fingerprint
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Claim => "claim",
            NodeType::Step => "step",
            NodeType::Axiom => "axiom",
            NodeType::LocalAssume => "local_assume",
            NodeType::Definition => "definition",
            NodeType::Case => "case",
        }
    }
}

/// Who owns the right to mutate a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    /// Free for any agent to claim
    Available,
    /// Held by an agent until released, reaped or refreshed
    Claimed,
    /// Withheld from claiming (dependency-driven)
    Blocked,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Available => "available",
            WorkflowState::Claimed => "claimed",
            WorkflowState::Blocked => "blocked",
        }
    }
}

/// What is believed about a node's truth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpistemicState {
    /// Not yet examined
    Pending,
    /// Accepted with proof
    Validated,
    /// Accepted without proof; introduces self-admitted taint
    Admitted,
    /// Shown false
    Refuted,
    /// Retired without verdict
    Archived,
    /// Sent back to its prover for rework
    NeedsRefinement,
}

impl EpistemicState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpistemicState::Pending => "pending",
            EpistemicState::Validated => "validated",
            EpistemicState::Admitted => "admitted",
            EpistemicState::Refuted => "refuted",
            EpistemicState::Archived => "archived",
            EpistemicState::NeedsRefinement => "needs_refinement",
        }
    }
}

/// Contamination from admitted ancestors.
///
/// Lattice: unresolved < clean; self_admitted and tainted are contagious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaintState {
    /// No verdict recorded yet
    Unresolved,
    /// Validated with no contaminated ancestor
    Clean,
    /// The node itself was admitted without proof
    SelfAdmitted,
    /// Some ancestor is self-admitted or tainted
    Tainted,
}

impl TaintState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaintState::Unresolved => "unresolved",
            TaintState::Clean => "clean",
            TaintState::SelfAdmitted => "self_admitted",
            TaintState::Tainted => "tainted",
        }
    }

    /// True for states that contaminate descendants
    pub fn is_contagious(&self) -> bool {
        matches!(self, TaintState::SelfAdmitted | TaintState::Tainted)
    }
}

/// A single node in the proof graph.
///
/// Created exactly once by a node-created event, mutated only by later
/// events referencing its id, never deleted (archiving is an epistemic
/// state, not removal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Hierarchical identifier
    pub id: NodeId,
    /// Structural role
    pub node_type: NodeType,
    /// The mathematical claim, in prose
    pub statement: String,
    /// Optional LaTeX rendition of the statement
    #[serde(default)]
    pub latex: String,
    /// Named inference rule justifying this node
    #[serde(default)]
    pub inference: String,
    /// Definition / external ids this node draws on
    #[serde(default)]
    pub context: Vec<String>,
    /// Node ids this node rests on
    #[serde(default)]
    pub dependencies: Vec<NodeId>,
    /// Assumption-node ids under whose scope this node lives
    #[serde(default)]
    pub scope: Vec<NodeId>,
    /// Claim ownership state
    pub workflow: WorkflowState,
    /// Owner while claimed, empty otherwise
    #[serde(default)]
    pub claimed_by: String,
    /// Claim timeout while claimed, unset otherwise
    #[serde(default)]
    pub claimed_until: Option<DateTime<Utc>>,
    /// Truth verdict state
    pub epistemic: EpistemicState,
    /// Contamination state
    pub taint: TaintState,
    /// 64-char lowercase hex fingerprint of the semantic fields
    pub content_hash: String,
}

impl Node {
    /// Create a new available, pending, unresolved node with a computed
    /// content hash. The statement must be non-empty.
    pub fn new(id: NodeId, node_type: NodeType, statement: impl Into<String>) -> CoreResult<Self> {
        let statement = statement.into();
        if statement.is_empty() {
            return Err(CoreError::NilArgument("statement"));
        }
        let mut node = Self {
            id,
            node_type,
            statement,
            latex: String::new(),
            inference: String::new(),
            context: Vec::new(),
            dependencies: Vec::new(),
            scope: Vec::new(),
            workflow: WorkflowState::Available,
            claimed_by: String::new(),
            claimed_until: None,
            epistemic: EpistemicState::Pending,
            taint: TaintState::Unresolved,
            content_hash: String::new(),
        };
        node.content_hash = node.computed_hash();
        Ok(node)
    }

    /// Attach dependencies, recomputing the content hash
    pub fn with_dependencies(mut self, dependencies: Vec<NodeId>) -> Self {
        self.dependencies = dependencies;
        self.content_hash = self.computed_hash();
        self
    }

    /// Attach context ids, recomputing the content hash
    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self.content_hash = self.computed_hash();
        self
    }

    /// Attach a LaTeX rendition, recomputing the content hash
    pub fn with_latex(mut self, latex: impl Into<String>) -> Self {
        self.latex = latex.into();
        self.content_hash = self.computed_hash();
        self
    }

    /// Attach an inference rule, recomputing the content hash
    pub fn with_inference(mut self, inference: impl Into<String>) -> Self {
        self.inference = inference.into();
        self.content_hash = self.computed_hash();
        self
    }

    /// Attach a declared scope list (not part of the content hash)
    pub fn with_scope(mut self, scope: Vec<NodeId>) -> Self {
        self.scope = scope;
        self
    }

    /// Recompute the content fingerprint from the current semantic fields
    pub fn computed_hash(&self) -> String {
        hash::compute_node_hash(
            self.node_type.as_str(),
            &self.statement,
            &self.latex,
            &self.inference,
            &self.context,
            &self.dependencies,
        )
    }

    /// Structural validation of a node snapshot arriving in an event
    pub fn validate(&self) -> CoreResult<()> {
        if self.statement.is_empty() {
            return Err(CoreError::NilArgument("statement"));
        }
        if !hash::is_well_formed_hash(&self.content_hash) {
            return Err(CoreError::NilArgument("content_hash"));
        }
        let claimed = self.workflow == WorkflowState::Claimed;
        if claimed && self.claimed_by.is_empty() {
            return Err(CoreError::NilArgument("claimed_by"));
        }
        if claimed && self.claimed_until.is_none() {
            return Err(CoreError::NilArgument("claimed_until"));
        }
        if !claimed && (!self.claimed_by.is_empty() || self.claimed_until.is_some()) {
            return Err(CoreError::invalid_transition(
                &self.id,
                self.workflow.as_str(),
                "claimed",
            ));
        }
        Ok(())
    }

    /// available -> claimed
    pub fn claim(&mut self, owner: &str, until: DateTime<Utc>) -> CoreResult<()> {
        if owner.is_empty() {
            return Err(CoreError::NilArgument("owner"));
        }
        if self.workflow != WorkflowState::Available {
            return Err(CoreError::invalid_transition(
                &self.id,
                self.workflow.as_str(),
                "claimed",
            ));
        }
        self.workflow = WorkflowState::Claimed;
        self.claimed_by = owner.to_string();
        self.claimed_until = Some(until);
        Ok(())
    }

    /// claimed -> available (release or reap)
    pub fn release(&mut self) -> CoreResult<()> {
        if self.workflow != WorkflowState::Claimed {
            return Err(CoreError::invalid_transition(
                &self.id,
                self.workflow.as_str(),
                "available",
            ));
        }
        self.workflow = WorkflowState::Available;
        self.claimed_by.clear();
        self.claimed_until = None;
        Ok(())
    }

    /// Extend an existing claim's timeout
    pub fn refresh_claim(&mut self, until: DateTime<Utc>) -> CoreResult<()> {
        if self.workflow != WorkflowState::Claimed {
            return Err(CoreError::invalid_transition(
                &self.id,
                self.workflow.as_str(),
                "claimed",
            ));
        }
        self.claimed_until = Some(until);
        Ok(())
    }

    /// any -> blocked (dependency-driven); drops any live claim
    pub fn block(&mut self) {
        self.workflow = WorkflowState::Blocked;
        self.claimed_by.clear();
        self.claimed_until = None;
    }

    /// True while claimed with a timeout at or before `now`
    pub fn is_claim_expired(&self, now: DateTime<Utc>) -> bool {
        self.workflow == WorkflowState::Claimed
            && self.claimed_until.is_some_and(|until| until <= now)
    }

    /// Guarded epistemic transition.
    ///
    /// Legal moves: pending -> {validated, admitted, refuted, archived,
    /// needs_refinement} and needs_refinement -> pending. Everything else
    /// is an invalid transition; validated and admitted nodes only change
    /// through taint recomputation.
    pub fn set_epistemic(&mut self, to: EpistemicState) -> CoreResult<()> {
        use EpistemicState::*;
        let legal = matches!(
            (self.epistemic, to),
            (Pending, Validated)
                | (Pending, Admitted)
                | (Pending, Refuted)
                | (Pending, Archived)
                | (Pending, NeedsRefinement)
                | (NeedsRefinement, Pending)
        );
        if !legal {
            return Err(CoreError::invalid_transition(
                &self.id,
                self.epistemic.as_str(),
                to.as_str(),
            ));
        }
        self.epistemic = to;
        Ok(())
    }
}
