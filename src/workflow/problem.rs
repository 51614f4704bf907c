//! Problem-refinement workflow.
//!
//! ```text
//! load -> extract -> check -> refine -> save
//! ```
//!
//! `refine` is a pass-through unless the consistency check produced a real
//! observation, so the reasoner is asked to refine at most once per run.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::commit::{commit, SolutionMutation};
use super::{load_or_default, WorkflowSettings};
use crate::ai::{format_observations, problem_inputs, PromptInputs, PromptKind, Reasoner};
use crate::core::Result;
use crate::document::{equal, validate, validate_problem_space, Document, ProblemSpace, Workspace};
use crate::pipeline::{required, GraphError, PipelineContext, RuntimeConfig, Step, StepGraph};
use crate::store::SnapshotStore;

/// Slots of [`ProblemContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProblemField {
    WorkspaceId,
    VersionId,
    ChatInput,
    RemoveSolutions,
    Loaded,
    ExtractedProblem,
    ExtractChanged,
    Observations,
    FinalProblem,
    HasChanges,
    FinalVersion,
}

/// One write to a [`ProblemContext`] slot.
#[derive(Debug, Clone)]
pub enum ProblemDelta {
    Loaded(Workspace),
    ExtractedProblem(ProblemSpace),
    ExtractChanged(bool),
    Observations(Vec<String>),
    FinalProblem(ProblemSpace),
    HasChanges(bool),
    FinalVersion(String),
}

/// State threaded through a problem-refinement run.
#[derive(Debug, Clone)]
pub struct ProblemContext {
    pub workspace_id: String,
    pub version_id: String,
    pub chat_input: String,
    pub remove_solutions: bool,

    pub loaded: Option<Workspace>,
    pub extracted_problem: Option<ProblemSpace>,
    pub extract_changed: Option<bool>,
    pub observations: Option<Vec<String>>,
    pub final_problem: Option<ProblemSpace>,
    pub has_changes: Option<bool>,
    pub final_version: Option<String>,
}

impl ProblemContext {
    /// Initial context for one invocation.
    pub fn new(
        workspace_id: impl Into<String>,
        version_id: impl Into<String>,
        chat_input: impl Into<String>,
        remove_solutions: bool,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            version_id: version_id.into(),
            chat_input: chat_input.into(),
            remove_solutions,
            loaded: None,
            extracted_problem: None,
            extract_changed: None,
            observations: None,
            final_problem: None,
            has_changes: None,
            final_version: None,
        }
    }
}

impl PipelineContext for ProblemContext {
    type Field = ProblemField;
    type Delta = ProblemDelta;

    fn is_set(&self, field: ProblemField) -> bool {
        match field {
            ProblemField::WorkspaceId
            | ProblemField::VersionId
            | ProblemField::ChatInput
            | ProblemField::RemoveSolutions => true,
            ProblemField::Loaded => self.loaded.is_some(),
            ProblemField::ExtractedProblem => self.extracted_problem.is_some(),
            ProblemField::ExtractChanged => self.extract_changed.is_some(),
            ProblemField::Observations => self.observations.is_some(),
            ProblemField::FinalProblem => self.final_problem.is_some(),
            ProblemField::HasChanges => self.has_changes.is_some(),
            ProblemField::FinalVersion => self.final_version.is_some(),
        }
    }

    fn field_of(delta: &ProblemDelta) -> ProblemField {
        match delta {
            ProblemDelta::Loaded(_) => ProblemField::Loaded,
            ProblemDelta::ExtractedProblem(_) => ProblemField::ExtractedProblem,
            ProblemDelta::ExtractChanged(_) => ProblemField::ExtractChanged,
            ProblemDelta::Observations(_) => ProblemField::Observations,
            ProblemDelta::FinalProblem(_) => ProblemField::FinalProblem,
            ProblemDelta::HasChanges(_) => ProblemField::HasChanges,
            ProblemDelta::FinalVersion(_) => ProblemField::FinalVersion,
        }
    }

    fn apply(&mut self, delta: ProblemDelta) {
        match delta {
            ProblemDelta::Loaded(v) => self.loaded = Some(v),
            ProblemDelta::ExtractedProblem(v) => self.extracted_problem = Some(v),
            ProblemDelta::ExtractChanged(v) => self.extract_changed = Some(v),
            ProblemDelta::Observations(v) => self.observations = Some(v),
            ProblemDelta::FinalProblem(v) => self.final_problem = Some(v),
            ProblemDelta::HasChanges(v) => self.has_changes = Some(v),
            ProblemDelta::FinalVersion(v) => self.final_version = Some(v),
        }
    }
}

/// Whether a consistency check asks for refinement.
///
/// An empty list, or the single observation "Consistent" in any case, means
/// the problem space is fine as it is.
pub fn needs_refinement(observations: &[String]) -> bool {
    match observations {
        [] => false,
        [only] => !only.trim().eq_ignore_ascii_case("consistent"),
        _ => true,
    }
}

/// Build the problem-refinement graph.
pub fn problem_graph(
    store: Arc<dyn SnapshotStore>,
    reasoner: Arc<dyn Reasoner>,
    settings: WorkflowSettings,
) -> std::result::Result<StepGraph<ProblemContext>, GraphError> {
    StepGraph::builder("problem-refinement")
        .step(LoadWorkspace { store: store.clone() })
        .step(ExtractProblem { reasoner: reasoner.clone() })
        .step(CheckConsistency { reasoner: reasoner.clone() })
        .step(RefineProblem { reasoner })
        .step(SaveProblem { store, settings })
        .build()
}

/// Reasoner output for [`PromptKind::CheckConsistency`].
#[derive(Debug, Deserialize)]
struct Observations {
    #[serde(default)]
    items: Vec<String>,
}

impl Document for Observations {
    const KIND: &'static str = "Observations";
}

async fn ask_for_problem(
    reasoner: &dyn Reasoner,
    kind: PromptKind,
    inputs: &PromptInputs,
    config: &RuntimeConfig,
) -> Result<ProblemSpace> {
    let raw = reasoner.invoke(kind, inputs, config).await?;
    validate_problem_space(&raw)
}

struct LoadWorkspace {
    store: Arc<dyn SnapshotStore>,
}

#[async_trait]
impl Step<ProblemContext> for LoadWorkspace {
    fn name(&self) -> &'static str {
        "load"
    }

    fn reads(&self) -> &[ProblemField] {
        &[ProblemField::WorkspaceId, ProblemField::VersionId]
    }

    fn writes(&self) -> &[ProblemField] {
        &[ProblemField::Loaded]
    }

    async fn run(
        &self,
        ctx: &ProblemContext,
        _config: &RuntimeConfig,
    ) -> Result<Vec<ProblemDelta>> {
        let workspace = load_or_default(self.store.as_ref(), &ctx.workspace_id, &ctx.version_id)?;
        Ok(vec![ProblemDelta::Loaded(workspace)])
    }
}

struct ExtractProblem {
    reasoner: Arc<dyn Reasoner>,
}

#[async_trait]
impl Step<ProblemContext> for ExtractProblem {
    fn name(&self) -> &'static str {
        "extract"
    }

    fn reads(&self) -> &[ProblemField] {
        &[ProblemField::Loaded, ProblemField::ChatInput]
    }

    fn writes(&self) -> &[ProblemField] {
        &[ProblemField::ExtractedProblem, ProblemField::ExtractChanged]
    }

    async fn run(&self, ctx: &ProblemContext, config: &RuntimeConfig) -> Result<Vec<ProblemDelta>> {
        let current = &required(&ctx.loaded, self.name(), ProblemField::Loaded)?.problem_space;

        let mut inputs = problem_inputs(current);
        inputs.insert("chat_input".to_string(), Value::from(ctx.chat_input.as_str()));

        let extracted =
            ask_for_problem(self.reasoner.as_ref(), PromptKind::ExtractProblem, &inputs, config)
                .await?;
        let changed = !equal(&extracted, current);
        tracing::debug!(changed, "Extracted problem space");

        Ok(vec![ProblemDelta::ExtractedProblem(extracted), ProblemDelta::ExtractChanged(changed)])
    }
}

struct CheckConsistency {
    reasoner: Arc<dyn Reasoner>,
}

#[async_trait]
impl Step<ProblemContext> for CheckConsistency {
    fn name(&self) -> &'static str {
        "check"
    }

    fn reads(&self) -> &[ProblemField] {
        &[ProblemField::ExtractedProblem]
    }

    fn writes(&self) -> &[ProblemField] {
        &[ProblemField::Observations]
    }

    async fn run(&self, ctx: &ProblemContext, config: &RuntimeConfig) -> Result<Vec<ProblemDelta>> {
        let problem =
            required(&ctx.extracted_problem, self.name(), ProblemField::ExtractedProblem)?;

        let raw = self
            .reasoner
            .invoke(PromptKind::CheckConsistency, &problem_inputs(problem), config)
            .await?;
        let observations: Observations = validate(&raw)?;
        tracing::debug!(count = observations.items.len(), "Consistency check complete");

        Ok(vec![ProblemDelta::Observations(observations.items)])
    }
}

struct RefineProblem {
    reasoner: Arc<dyn Reasoner>,
}

#[async_trait]
impl Step<ProblemContext> for RefineProblem {
    fn name(&self) -> &'static str {
        "refine"
    }

    fn reads(&self) -> &[ProblemField] {
        &[
            ProblemField::ExtractedProblem,
            ProblemField::ExtractChanged,
            ProblemField::Observations,
            ProblemField::ChatInput,
        ]
    }

    fn writes(&self) -> &[ProblemField] {
        &[ProblemField::FinalProblem, ProblemField::HasChanges]
    }

    async fn run(&self, ctx: &ProblemContext, config: &RuntimeConfig) -> Result<Vec<ProblemDelta>> {
        let extracted =
            required(&ctx.extracted_problem, self.name(), ProblemField::ExtractedProblem)?;
        let extract_changed =
            *required(&ctx.extract_changed, self.name(), ProblemField::ExtractChanged)?;
        let observations = required(&ctx.observations, self.name(), ProblemField::Observations)?;

        if !needs_refinement(observations) {
            tracing::debug!("Problem space is consistent, skipping refinement");
            return Ok(vec![
                ProblemDelta::FinalProblem(extracted.clone()),
                ProblemDelta::HasChanges(extract_changed),
            ]);
        }

        let mut inputs = problem_inputs(extracted);
        inputs.insert("chat_input".to_string(), Value::from(ctx.chat_input.as_str()));
        inputs.insert("observations".to_string(), Value::from(format_observations(observations)));

        let revised =
            ask_for_problem(self.reasoner.as_ref(), PromptKind::RefineProblem, &inputs, config)
                .await?;
        let has_changes = extract_changed || !equal(&revised, extracted);
        tracing::debug!(observations = observations.len(), has_changes, "Refined problem space");

        Ok(vec![ProblemDelta::FinalProblem(revised), ProblemDelta::HasChanges(has_changes)])
    }
}

struct SaveProblem {
    store: Arc<dyn SnapshotStore>,
    settings: WorkflowSettings,
}

#[async_trait]
impl Step<ProblemContext> for SaveProblem {
    fn name(&self) -> &'static str {
        "save"
    }

    fn reads(&self) -> &[ProblemField] {
        &[
            ProblemField::Loaded,
            ProblemField::FinalProblem,
            ProblemField::HasChanges,
            ProblemField::RemoveSolutions,
        ]
    }

    fn writes(&self) -> &[ProblemField] {
        &[ProblemField::FinalVersion]
    }

    async fn run(
        &self,
        ctx: &ProblemContext,
        _config: &RuntimeConfig,
    ) -> Result<Vec<ProblemDelta>> {
        let parent = required(&ctx.loaded, self.name(), ProblemField::Loaded)?;
        let problem = required(&ctx.final_problem, self.name(), ProblemField::FinalProblem)?;
        let has_changes = *required(&ctx.has_changes, self.name(), ProblemField::HasChanges)?;

        let mutation = if ctx.remove_solutions {
            SolutionMutation::Remove
        } else {
            SolutionMutation::Keep
        };

        let version = commit(
            self.store.as_ref(),
            self.settings.version_scheme,
            parent,
            problem.clone(),
            has_changes,
            mutation,
        )?;

        Ok(vec![ProblemDelta::FinalVersion(version)])
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ai::ScriptedReasoner;
    use crate::pipeline::PipelineEngine;
    use crate::store::MemoryStore;

    fn problem_json(goal: &str) -> Value {
        json!({
            "context": "A payment processing system",
            "invariants": ["Must be on-premise"],
            "goal": goal,
            "problem": "The database locks at 5k TPS",
            "variants": ["Hardware resources (currently: 12 CPU)"],
        })
    }

    #[test]
    fn test_needs_refinement() {
        assert!(!needs_refinement(&[]));
        assert!(!needs_refinement(&["Consistent".to_string()]));
        assert!(!needs_refinement(&[" consistent ".to_string()]));
        assert!(needs_refinement(&["Goal conflicts with invariant".to_string()]));
        assert!(needs_refinement(&["Consistent".to_string(), "But vague".to_string()]));
    }

    #[test]
    fn test_graph_order() {
        let graph = problem_graph(
            Arc::new(MemoryStore::new()),
            Arc::new(ScriptedReasoner::new()),
            WorkflowSettings::default(),
        )
        .unwrap();
        assert_eq!(graph.order(), vec!["load", "extract", "check", "refine", "save"]);
    }

    #[tokio::test]
    async fn test_refine_skipped_when_consistent() {
        let reasoner = Arc::new(
            ScriptedReasoner::new()
                .respond(PromptKind::ExtractProblem, problem_json("Handle 50k TPS"))
                .respond(PromptKind::CheckConsistency, json!({ "items": ["Consistent"] })),
        );
        let store = Arc::new(MemoryStore::new());
        let graph =
            problem_graph(store.clone(), reasoner.clone(), WorkflowSettings::default()).unwrap();

        let run = PipelineEngine::new()
            .run(
                &graph,
                ProblemContext::new("ws1", "v0", "scale payments", false),
                &RuntimeConfig::new(),
            )
            .await
            .unwrap();

        assert_eq!(reasoner.call_count(PromptKind::RefineProblem), 0);
        assert_eq!(run.context.final_problem, run.context.extracted_problem);
        assert_eq!(run.context.final_version.as_deref(), Some("v1"));
        assert_eq!(run.trace.len(), 5);
    }

    #[tokio::test]
    async fn test_refine_output_becomes_final() {
        let reasoner = Arc::new(
            ScriptedReasoner::new()
                .respond(PromptKind::ExtractProblem, problem_json("Handle 50k TPS"))
                .respond(PromptKind::CheckConsistency, json!({ "items": ["Goal is vague"] }))
                .respond(PromptKind::RefineProblem, problem_json("Handle 50k TPS at p99 < 200ms")),
        );
        let store = Arc::new(MemoryStore::new());
        let graph =
            problem_graph(store.clone(), reasoner.clone(), WorkflowSettings::default()).unwrap();

        let run = PipelineEngine::new()
            .run(
                &graph,
                ProblemContext::new("ws1", "v0", "scale payments", false),
                &RuntimeConfig::new(),
            )
            .await
            .unwrap();

        let final_problem = run.context.final_problem.unwrap();
        assert_eq!(final_problem.goal, "Handle 50k TPS at p99 < 200ms");

        let refine_call = &reasoner.calls()[2];
        assert_eq!(refine_call.kind, PromptKind::RefineProblem);
        assert_eq!(refine_call.inputs["observations"], "- Goal is vague");
        assert_eq!(refine_call.inputs["chat_input"], "scale payments");
    }

    #[tokio::test]
    async fn test_wrong_shape_is_malformed() {
        let reasoner = Arc::new(
            ScriptedReasoner::new()
                .respond(PromptKind::ExtractProblem, json!({ "invariants": "one" })),
        );
        let store = Arc::new(MemoryStore::new());
        let graph = problem_graph(store.clone(), reasoner, WorkflowSettings::default()).unwrap();

        let err = PipelineEngine::new()
            .run(&graph, ProblemContext::new("ws1", "v0", "text", false), &RuntimeConfig::new())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::core::CompanionError::MalformedDocument(_)));
        assert_eq!(store.snapshot_count(), 0);
    }
}
