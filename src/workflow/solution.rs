//! Solution-generation workflow.
//!
//! ```text
//! load -> generate -> compare -> save
//! ```
//!
//! Each run adds exactly one candidate and recomputes the comparison over all
//! of them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::commit::{commit, SolutionMutation};
use super::{load_or_default, WorkflowSettings};
use crate::ai::{problem_inputs, summarize_candidates, PromptKind, Reasoner};
use crate::core::{CompanionError, Result};
use crate::document::{
    dedup_by_id, validate, CandidateAllocator, Comparison, Document, SolutionCandidate,
    SolutionSpace, Workspace,
};
use crate::pipeline::{required, GraphError, PipelineContext, RuntimeConfig, Step, StepGraph};
use crate::store::SnapshotStore;

/// Slots of [`SolutionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolutionField {
    WorkspaceId,
    VersionId,
    Loaded,
    NewCandidate,
    ProducedSolutions,
    FinalVersion,
}

/// One write to a [`SolutionContext`] slot.
#[derive(Debug, Clone)]
pub enum SolutionDelta {
    Loaded(Workspace),
    NewCandidate(SolutionCandidate),
    /// `None` when there is nothing to compare
    ProducedSolutions(Option<SolutionSpace>),
    FinalVersion(String),
}

/// State threaded through a solution-generation run.
#[derive(Debug, Clone)]
pub struct SolutionContext {
    pub workspace_id: String,
    pub version_id: String,

    pub loaded: Option<Workspace>,
    pub new_candidate: Option<SolutionCandidate>,
    pub produced_solutions: Option<Option<SolutionSpace>>,
    pub final_version: Option<String>,
}

impl SolutionContext {
    /// Initial context for one invocation.
    pub fn new(workspace_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            version_id: version_id.into(),
            loaded: None,
            new_candidate: None,
            produced_solutions: None,
            final_version: None,
        }
    }
}

impl PipelineContext for SolutionContext {
    type Field = SolutionField;
    type Delta = SolutionDelta;

    fn is_set(&self, field: SolutionField) -> bool {
        match field {
            SolutionField::WorkspaceId | SolutionField::VersionId => true,
            SolutionField::Loaded => self.loaded.is_some(),
            SolutionField::NewCandidate => self.new_candidate.is_some(),
            SolutionField::ProducedSolutions => self.produced_solutions.is_some(),
            SolutionField::FinalVersion => self.final_version.is_some(),
        }
    }

    fn field_of(delta: &SolutionDelta) -> SolutionField {
        match delta {
            SolutionDelta::Loaded(_) => SolutionField::Loaded,
            SolutionDelta::NewCandidate(_) => SolutionField::NewCandidate,
            SolutionDelta::ProducedSolutions(_) => SolutionField::ProducedSolutions,
            SolutionDelta::FinalVersion(_) => SolutionField::FinalVersion,
        }
    }

    fn apply(&mut self, delta: SolutionDelta) {
        match delta {
            SolutionDelta::Loaded(v) => self.loaded = Some(v),
            SolutionDelta::NewCandidate(v) => self.new_candidate = Some(v),
            SolutionDelta::ProducedSolutions(v) => self.produced_solutions = Some(v),
            SolutionDelta::FinalVersion(v) => self.final_version = Some(v),
        }
    }
}

/// Build the solution-generation graph.
pub fn solution_graph(
    store: Arc<dyn SnapshotStore>,
    reasoner: Arc<dyn Reasoner>,
    settings: WorkflowSettings,
) -> std::result::Result<StepGraph<SolutionContext>, GraphError> {
    StepGraph::builder("solution-generation")
        .step(LoadForSolutions { store: store.clone() })
        .step(GenerateCandidate { reasoner: reasoner.clone(), settings })
        .step(CompareSolutions { reasoner })
        .step(SaveSolutions { store, settings })
        .build()
}

/// Reasoner output for [`PromptKind::GenerateCandidate`]. Any id in the
/// reply is ignored; ids come from the allocator.
#[derive(Debug, Deserialize)]
struct CandidateDraft {
    hypothesis: String,
    model: String,
    #[serde(default)]
    reasoning: String,
}

impl Document for CandidateDraft {
    const KIND: &'static str = "SolutionCandidate";
}

/// Reasoner output for [`PromptKind::CompareSolutions`].
#[derive(Debug, Deserialize)]
struct ComparisonReply {
    analysis: String,
    recommendation: String,
    #[serde(default)]
    simplification_feedback: Option<String>,
}

impl Document for ComparisonReply {
    const KIND: &'static str = "Comparison";
}

struct LoadForSolutions {
    store: Arc<dyn SnapshotStore>,
}

#[async_trait]
impl Step<SolutionContext> for LoadForSolutions {
    fn name(&self) -> &'static str {
        "load"
    }

    fn reads(&self) -> &[SolutionField] {
        &[SolutionField::WorkspaceId, SolutionField::VersionId]
    }

    fn writes(&self) -> &[SolutionField] {
        &[SolutionField::Loaded]
    }

    async fn run(
        &self,
        ctx: &SolutionContext,
        _config: &RuntimeConfig,
    ) -> Result<Vec<SolutionDelta>> {
        let workspace = load_or_default(self.store.as_ref(), &ctx.workspace_id, &ctx.version_id)?;
        Ok(vec![SolutionDelta::Loaded(workspace)])
    }
}

struct GenerateCandidate {
    reasoner: Arc<dyn Reasoner>,
    settings: WorkflowSettings,
}

#[async_trait]
impl Step<SolutionContext> for GenerateCandidate {
    fn name(&self) -> &'static str {
        "generate"
    }

    fn reads(&self) -> &[SolutionField] {
        &[SolutionField::Loaded]
    }

    fn writes(&self) -> &[SolutionField] {
        &[SolutionField::NewCandidate]
    }

    async fn run(
        &self,
        ctx: &SolutionContext,
        config: &RuntimeConfig,
    ) -> Result<Vec<SolutionDelta>> {
        let workspace = required(&ctx.loaded, self.name(), SolutionField::Loaded)?;
        let existing: &[SolutionCandidate] =
            workspace.solution_space.as_ref().map(|s| s.candidates.as_slice()).unwrap_or(&[]);

        let mut inputs = problem_inputs(&workspace.problem_space);
        inputs.insert(
            "existing_candidates".to_string(),
            Value::from(summarize_candidates(existing, self.settings.model_summary_chars)),
        );

        let raw = self.reasoner.invoke(PromptKind::GenerateCandidate, &inputs, config).await?;
        let draft: CandidateDraft = validate(&raw)?;

        let id = CandidateAllocator::after(existing).allocate().ok_or_else(|| {
            CompanionError::MalformedDocument(format!("no candidate id left after {}", u32::MAX))
        })?;
        tracing::debug!(id, "Generated solution candidate");

        Ok(vec![SolutionDelta::NewCandidate(SolutionCandidate {
            id,
            hypothesis: draft.hypothesis,
            model: draft.model,
            reasoning: draft.reasoning,
        })])
    }
}

struct CompareSolutions {
    reasoner: Arc<dyn Reasoner>,
}

#[async_trait]
impl Step<SolutionContext> for CompareSolutions {
    fn name(&self) -> &'static str {
        "compare"
    }

    fn reads(&self) -> &[SolutionField] {
        &[SolutionField::Loaded, SolutionField::NewCandidate]
    }

    fn writes(&self) -> &[SolutionField] {
        &[SolutionField::ProducedSolutions]
    }

    async fn run(
        &self,
        ctx: &SolutionContext,
        config: &RuntimeConfig,
    ) -> Result<Vec<SolutionDelta>> {
        let workspace = required(&ctx.loaded, self.name(), SolutionField::Loaded)?;
        let candidate = required(&ctx.new_candidate, self.name(), SolutionField::NewCandidate)?;

        let mut candidates = workspace
            .solution_space
            .as_ref()
            .map(|s| s.candidates.clone())
            .unwrap_or_default();
        candidates.push(candidate.clone());
        let candidates = dedup_by_id(candidates);

        if candidates.is_empty() {
            return Ok(vec![SolutionDelta::ProducedSolutions(None)]);
        }

        let mut inputs = problem_inputs(&workspace.problem_space);
        inputs.insert("candidates".to_string(), serde_json::to_value(&candidates)?);

        let raw = self.reasoner.invoke(PromptKind::CompareSolutions, &inputs, config).await?;
        let reply: ComparisonReply = validate(&raw)?;
        tracing::debug!(candidates = candidates.len(), "Compared solution candidates");

        let space = SolutionSpace {
            candidates,
            comparison: Some(Comparison {
                analysis: reply.analysis,
                recommendation: reply.recommendation,
            }),
            simplification_feedback: reply.simplification_feedback.filter(|s| !s.trim().is_empty()),
        };

        Ok(vec![SolutionDelta::ProducedSolutions(Some(space))])
    }
}

struct SaveSolutions {
    store: Arc<dyn SnapshotStore>,
    settings: WorkflowSettings,
}

#[async_trait]
impl Step<SolutionContext> for SaveSolutions {
    fn name(&self) -> &'static str {
        "save"
    }

    fn reads(&self) -> &[SolutionField] {
        &[SolutionField::Loaded, SolutionField::ProducedSolutions]
    }

    fn writes(&self) -> &[SolutionField] {
        &[SolutionField::FinalVersion]
    }

    async fn run(
        &self,
        ctx: &SolutionContext,
        _config: &RuntimeConfig,
    ) -> Result<Vec<SolutionDelta>> {
        let parent = required(&ctx.loaded, self.name(), SolutionField::Loaded)?;
        let produced =
            required(&ctx.produced_solutions, self.name(), SolutionField::ProducedSolutions)?;

        let mutation = match produced {
            Some(space) => SolutionMutation::Replace(space.clone()),
            None => SolutionMutation::Keep,
        };

        let version = commit(
            self.store.as_ref(),
            self.settings.version_scheme,
            parent,
            parent.problem_space.clone(),
            false,
            mutation,
        )?;

        Ok(vec![SolutionDelta::FinalVersion(version)])
    }
}
