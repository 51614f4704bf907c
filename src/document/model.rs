//! Problem-space and solution-space document types.
//!
//! Serialized field names are part of the on-disk format; optional fields are
//! omitted rather than written as `null`.

use serde::{Deserialize, Serialize};

/// The formalized problem: what the system is, what cannot change, what we
/// want, what stands in the way, and what is free to vary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemSpace {
    /// One sentence describing the system
    pub context: String,

    /// Hard constraints
    pub invariants: Vec<String>,

    /// Single sentence objective
    pub goal: String,

    /// The tension preventing the goal under the invariants
    pub problem: String,

    /// Degrees of freedom
    pub variants: Vec<String>,
}

impl ProblemSpace {
    /// Whether every field is still at its default.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// One proposed architecture for the problem space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionCandidate {
    /// Identifier, unique within a solution space, starting at 1
    pub id: u32,

    /// Which variants or invariants change to enable the solution
    pub hypothesis: String,

    /// Technical description of the solution
    pub model: String,

    /// Why this model satisfies the goal
    #[serde(default)]
    pub reasoning: String,
}

/// Comparative analysis across all candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub analysis: String,
    pub recommendation: String,
}

/// Candidate solutions plus their comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolutionSpace {
    /// Candidates in creation order
    pub candidates: Vec<SolutionCandidate>,

    /// Comparison over all candidates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,

    /// One idea for simplifying the recommended candidate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplification_feedback: Option<String>,
}

impl SolutionSpace {
    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate ids in stored order.
    pub fn candidate_ids(&self) -> Vec<u32> {
        self.candidates.iter().map(|c| c.id).collect()
    }

    /// Find a candidate by id.
    pub fn candidate(&self, id: u32) -> Option<&SolutionCandidate> {
        self.candidates.iter().find(|c| c.id == id)
    }
}

/// One immutable snapshot of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Stable workspace identifier
    pub id: String,

    /// Identifier of this snapshot, unique within the workspace
    pub version: String,

    pub problem_space: ProblemSpace,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_space: Option<SolutionSpace>,
}

impl Workspace {
    /// Create a workspace snapshot with an empty problem space.
    pub fn empty(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            problem_space: ProblemSpace::default(),
            solution_space: None,
        }
    }

    /// Number of candidates in the solution space (0 when absent).
    pub fn candidate_count(&self) -> usize {
        self.solution_space.as_ref().map(SolutionSpace::len).unwrap_or(0)
    }
}

/// Structural, order-sensitive equality.
///
/// This is the only change-detection primitive used by the workflows.
pub fn equal<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}
