//! The single commit point shared by both workflows.

use crate::core::Result;
use crate::document::{ProblemSpace, SolutionSpace, Workspace};
use crate::store::{mint_version, SnapshotStore, VersionScheme};

/// What to do with the parent's solution space when committing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolutionMutation {
    /// Carry the parent's solution space over unchanged
    Keep,

    /// Drop the solution space
    Remove,

    /// Replace it with a freshly produced one
    Replace(SolutionSpace),
}

impl SolutionMutation {
    pub fn is_requested(&self) -> bool {
        !matches!(self, Self::Keep)
    }
}

/// Why a new version was written. Logged, not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveReason {
    ProblemChanged,
    SolutionsRemoved,
    SolutionsReplaced,
}

/// Persist the outcome of a workflow run.
///
/// Returns the parent's version id untouched when nothing changed and no
/// solution-space mutation was requested. Otherwise mints a fresh version id,
/// writes the new snapshot and returns the new id.
pub fn commit(
    store: &dyn SnapshotStore,
    scheme: VersionScheme,
    parent: &Workspace,
    problem_space: ProblemSpace,
    has_changes: bool,
    mutation: SolutionMutation,
) -> Result<String> {
    if !has_changes && !mutation.is_requested() {
        tracing::info!(
            workspace = parent.id,
            version = parent.version,
            "No changes detected, keeping current version"
        );
        return Ok(parent.version.clone());
    }

    let (solution_space, reason) = match mutation {
        SolutionMutation::Keep => (parent.solution_space.clone(), SaveReason::ProblemChanged),
        SolutionMutation::Remove if has_changes => (None, SaveReason::ProblemChanged),
        SolutionMutation::Remove => (None, SaveReason::SolutionsRemoved),
        SolutionMutation::Replace(space) => (Some(space), SaveReason::SolutionsReplaced),
    };

    let existing = store.list_versions(&parent.id)?;
    let version = mint_version(scheme, &existing, &parent.version)?;

    let workspace = Workspace {
        id: parent.id.clone(),
        version: version.clone(),
        problem_space,
        solution_space,
    };
    let location = store.save(&workspace)?;

    tracing::info!(
        workspace = workspace.id,
        parent = parent.version,
        version,
        ?reason,
        location,
        "Committed new version"
    );

    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::SolutionCandidate;
    use crate::store::MemoryStore;

    fn parent_with_solutions() -> Workspace {
        let mut ws = Workspace::empty("ws1", "v1");
        ws.problem_space.goal = "Handle 50k TPS".to_string();
        ws.solution_space = Some(SolutionSpace {
            candidates: vec![SolutionCandidate {
                id: 1,
                hypothesis: "Shard".to_string(),
                model: "Four shards".to_string(),
                reasoning: String::new(),
            }],
            ..Default::default()
        });
        ws
    }

    #[test]
    fn test_no_change_is_a_no_op() {
        let store = MemoryStore::new();
        let parent = parent_with_solutions();
        store.save(&parent).unwrap();

        let version = commit(
            &store,
            VersionScheme::Sequential,
            &parent,
            parent.problem_space.clone(),
            false,
            SolutionMutation::Keep,
        )
        .unwrap();

        assert_eq!(version, "v1");
        assert_eq!(store.snapshot_count(), 1);
    }

    #[test]
    fn test_change_keeps_solutions() {
        let store = MemoryStore::new();
        let parent = parent_with_solutions();
        store.save(&parent).unwrap();

        let mut problem = parent.problem_space.clone();
        problem.goal = "Handle 80k TPS".to_string();
        let version = commit(
            &store,
            VersionScheme::Sequential,
            &parent,
            problem,
            true,
            SolutionMutation::Keep,
        )
        .unwrap();

        assert_eq!(version, "v2");
        let saved = store.load("ws1", "v2").unwrap();
        assert_eq!(saved.problem_space.goal, "Handle 80k TPS");
        assert_eq!(saved.candidate_count(), 1);
        // Parent untouched
        assert_eq!(store.load("ws1", "v1").unwrap(), parent);
    }

    #[test]
    fn test_remove_without_change_still_writes() {
        let store = MemoryStore::new();
        let parent = parent_with_solutions();
        store.save(&parent).unwrap();

        let version = commit(
            &store,
            VersionScheme::Sequential,
            &parent,
            parent.problem_space.clone(),
            false,
            SolutionMutation::Remove,
        )
        .unwrap();

        assert_eq!(version, "v2");
        let saved = store.load("ws1", "v2").unwrap();
        assert!(saved.solution_space.is_none());
        assert_eq!(saved.problem_space, parent.problem_space);
    }

    #[test]
    fn test_random_scheme() {
        let store = MemoryStore::new();
        let parent = Workspace::empty("ws1", "v0");
        let mut problem = ProblemSpace::default();
        problem.context = "A ledger".to_string();

        let version =
            commit(&store, VersionScheme::Random, &parent, problem, true, SolutionMutation::Keep)
                .unwrap();
        assert_eq!(version.len(), 8);
        assert!(store.contains("ws1", &version).unwrap());
    }
}
