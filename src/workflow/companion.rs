//! Entry point tying a store, a reasoner and both workflows together.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::problem::{problem_graph, ProblemContext};
use super::solution::{solution_graph, SolutionContext};
use super::{load_or_default, WorkflowSettings};
use crate::ai::{Reasoner, ReasonerChain};
use crate::core::{CompanionError, Config, Result};
use crate::document::Workspace;
use crate::pipeline::{PipelineEngine, RuntimeConfig, StepGraph};
use crate::store::{mint_version, FileStore, SnapshotStore, INITIAL_VERSION};

/// The system design companion.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Companion {
    store: Arc<dyn SnapshotStore>,
    reasoner: Arc<dyn Reasoner>,
    runtime: RuntimeConfig,
    settings: WorkflowSettings,
    engine: PipelineEngine,
    problem: StepGraph<ProblemContext>,
    solution: StepGraph<SolutionContext>,
}

impl Companion {
    /// Create a companion with default settings.
    pub fn new(store: Arc<dyn SnapshotStore>, reasoner: Arc<dyn Reasoner>) -> Result<Self> {
        Self::with_settings(store, reasoner, WorkflowSettings::default())
    }

    /// Create a companion with explicit workflow settings.
    pub fn with_settings(
        store: Arc<dyn SnapshotStore>,
        reasoner: Arc<dyn Reasoner>,
        settings: WorkflowSettings,
    ) -> Result<Self> {
        let problem = problem_graph(store.clone(), reasoner.clone(), settings)?;
        let solution = solution_graph(store.clone(), reasoner.clone(), settings)?;

        Ok(Self {
            store,
            reasoner,
            runtime: RuntimeConfig::default(),
            settings,
            engine: PipelineEngine::new(),
            problem,
            solution,
        })
    }

    /// Create a companion backed by the filesystem store and the configured
    /// reasoner chain.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(FileStore::new(config.workspaces_root()));
        let reasoner = Arc::new(ReasonerChain::from_config(&config.ai)?);

        Ok(Self::with_settings(store, reasoner, config.workflow_settings())?
            .with_runtime(config.runtime()))
    }

    /// Replace the runtime parameters threaded to every step.
    pub fn with_runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn store(&self) -> &dyn SnapshotStore {
        self.store.as_ref()
    }

    pub fn reasoner(&self) -> &dyn Reasoner {
        self.reasoner.as_ref()
    }

    pub fn settings(&self) -> WorkflowSettings {
        self.settings
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Refine the problem space of `version_id` from free text.
    ///
    /// Returns the new version id, or `version_id` itself when nothing
    /// changed and `remove_solutions` is false.
    pub async fn run_problem_workflow(
        &self,
        workspace_id: &str,
        version_id: &str,
        text: &str,
        remove_solutions: bool,
    ) -> Result<String> {
        tracing::info!(
            workspace = workspace_id,
            version = version_id,
            remove_solutions,
            "Refining problem space"
        );

        let initial = ProblemContext::new(workspace_id, version_id, text, remove_solutions);
        let run = self.engine.run(&self.problem, initial, &self.runtime).await?;

        tracing::debug!(elapsed = ?run.elapsed(), "Problem refinement finished");
        run.context.final_version.ok_or_else(|| missing_version(self.problem.name()))
    }

    /// Add one solution candidate to `version_id` and recompute the comparison.
    ///
    /// Fails with `CapacityExceeded` without calling the reasoner once the
    /// workspace holds the configured maximum number of candidates.
    pub async fn run_solution_workflow(
        &self,
        workspace_id: &str,
        version_id: &str,
    ) -> Result<String> {
        let current = load_or_default(self.store.as_ref(), workspace_id, version_id)?;
        let count = current.candidate_count();
        if count >= self.settings.max_candidates {
            return Err(CompanionError::CapacityExceeded {
                count,
                limit: self.settings.max_candidates,
            });
        }

        tracing::info!(
            workspace = workspace_id,
            version = version_id,
            candidates = count,
            "Generating solution candidate"
        );

        let initial = SolutionContext::new(workspace_id, version_id);
        let run = self.engine.run(&self.solution, initial, &self.runtime).await?;

        tracing::debug!(elapsed = ?run.elapsed(), "Solution generation finished");
        run.context.final_version.ok_or_else(|| missing_version(self.solution.name()))
    }

    /// Start a new workspace with a fresh id and an empty first version.
    pub fn create_workspace(&self) -> Result<Workspace> {
        let id = uuid::Uuid::new_v4().to_string();
        let version = mint_version(self.settings.version_scheme, &[], INITIAL_VERSION)?;

        let workspace = Workspace::empty(id, version);
        self.store.save(&workspace)?;
        tracing::info!(workspace = workspace.id, version = workspace.version, "Created workspace");

        Ok(workspace)
    }

    pub fn list_workspaces(&self) -> Result<BTreeSet<String>> {
        self.store.list_workspaces()
    }

    pub fn list_versions(&self, workspace_id: &str) -> Result<Vec<String>> {
        self.store.list_versions(workspace_id)
    }

    /// Most recently created version, if the workspace has any.
    pub fn latest_version(&self, workspace_id: &str) -> Result<Option<String>> {
        self.store.latest_version(workspace_id)
    }

    /// Load a snapshot, failing with `NotFound` if it does not exist.
    pub fn load(&self, workspace_id: &str, version_id: &str) -> Result<Workspace> {
        self.store.load(workspace_id, version_id)
    }
}

fn missing_version(graph: &str) -> CompanionError {
    crate::pipeline::GraphError::MissingInput {
        step: graph.to_string(),
        field: "FinalVersion".to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ai::{PromptKind, ScriptedReasoner};
    use crate::store::MemoryStore;

    fn companion(
        reasoner: ScriptedReasoner,
    ) -> (Arc<MemoryStore>, Arc<ScriptedReasoner>, Companion) {
        let store = Arc::new(MemoryStore::new());
        let reasoner = Arc::new(reasoner);
        let companion = Companion::new(store.clone(), reasoner.clone()).unwrap();
        (store, reasoner, companion)
    }

    #[test]
    fn test_create_workspace() {
        let (store, _, companion) = companion(ScriptedReasoner::new());
        let ws = companion.create_workspace().unwrap();

        assert_eq!(ws.version, "v1");
        assert!(ws.problem_space.is_empty());
        assert_eq!(companion.latest_version(&ws.id).unwrap().as_deref(), Some("v1"));
        assert_eq!(store.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn test_capacity_checked_before_reasoning() {
        let (store, reasoner, companion) = companion(ScriptedReasoner::new());

        let mut ws = Workspace::empty("ws1", "v1");
        let candidates = (1..=10)
            .map(|id| crate::document::SolutionCandidate {
                id,
                hypothesis: format!("h{id}"),
                model: String::new(),
                reasoning: String::new(),
            })
            .collect();
        ws.solution_space =
            Some(crate::document::SolutionSpace { candidates, ..Default::default() });
        store.save(&ws).unwrap();

        let err = companion.run_solution_workflow("ws1", "v1").await.unwrap_err();
        assert!(matches!(err, CompanionError::CapacityExceeded { count: 10, limit: 10 }));
        assert!(reasoner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_problem_keeps_version() {
        let (store, _, companion) = companion(
            ScriptedReasoner::new()
                .respond(PromptKind::ExtractProblem, json!({}))
                .respond(PromptKind::CheckConsistency, json!({ "items": [] })),
        );
        store.save(&Workspace::empty("ws1", "v1")).unwrap();

        let version =
            companion.run_problem_workflow("ws1", "v1", "nothing new", false).await.unwrap();
        assert_eq!(version, "v1");
        assert_eq!(store.snapshot_count(), 1);
    }

    #[tokio::test]
    async fn test_version_number_at_u64_max_is_an_error() {
        let (store, _, companion) = companion(
            ScriptedReasoner::new()
                .respond(PromptKind::ExtractProblem, json!({ "goal": "Reach 50k TPS" }))
                .respond(PromptKind::CheckConsistency, json!({ "items": [] })),
        );
        store.save(&Workspace::empty("ws1", "v18446744073709551615")).unwrap();

        let err = companion
            .run_problem_workflow("ws1", "v18446744073709551615", "new goal", false)
            .await
            .unwrap_err();

        assert!(matches!(err, CompanionError::InvalidIdentifier(_)));
        assert_eq!(store.snapshot_count(), 1);
    }
}
