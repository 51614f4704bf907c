//! Refinement workflows.
//!
//! Two step graphs run on the [`PipelineEngine`](crate::pipeline::PipelineEngine):
//!
//! - **Problem refinement**: load, extract, check, refine (only when the check
//!   found something), save
//! - **Solution generation**: load, generate one candidate, compare, save
//!
//! Both end in [`commit`], the single point where a new version is written.
//! [`Companion`] wires the graphs to a store and a reasoner; [`Session`]
//! tracks one user's position in one workspace.

mod commit;
mod companion;
mod problem;
mod session;
mod solution;

pub use commit::{commit, SaveReason, SolutionMutation};
pub use companion::Companion;
pub use problem::{needs_refinement, problem_graph, ProblemContext, ProblemDelta, ProblemField};
pub use session::{Outcome, Role, Session, TranscriptEntry};
pub use solution::{solution_graph, SolutionContext, SolutionDelta, SolutionField};

use crate::core::Result;
use crate::document::Workspace;
use crate::store::{SnapshotStore, VersionScheme};

/// Policy knobs shared by both workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// How new version ids are minted
    pub version_scheme: VersionScheme,

    /// Solution generation is refused once a workspace holds this many candidates
    pub max_candidates: usize,

    /// Characters of each existing candidate's model shown as a negative example
    pub model_summary_chars: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            version_scheme: VersionScheme::Sequential,
            max_candidates: 10,
            model_summary_chars: 200,
        }
    }
}

/// Load a snapshot, substituting an empty workspace if it does not exist.
///
/// Only `NotFound` is absorbed; malformed documents and IO errors propagate.
pub fn load_or_default(
    store: &dyn SnapshotStore,
    workspace_id: &str,
    version_id: &str,
) -> Result<Workspace> {
    match store.load(workspace_id, version_id) {
        Ok(workspace) => Ok(workspace),
        Err(e) if e.is_not_found() => {
            tracing::info!(
                workspace = workspace_id,
                version = version_id,
                "No snapshot found, starting from an empty problem space"
            );
            Ok(Workspace::empty(workspace_id, version_id))
        }
        Err(e) => Err(e),
    }
}
