//! Sequential execution of a step graph.

use std::time::{Duration, Instant};

use tracing::Instrument;

use super::graph::{GraphError, PipelineContext, StepGraph};
use super::runtime::RuntimeConfig;
use crate::core::{CompanionError, Result};

/// Timing record for one executed step.
#[derive(Debug, Clone)]
pub struct StepTrace {
    pub step: &'static str,
    pub duration: Duration,
    /// Number of deltas merged into the context
    pub writes: usize,
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct PipelineRun<C> {
    /// Context after every step has been merged
    pub context: C,

    /// Steps in the order they ran
    pub trace: Vec<StepTrace>,
}

impl<C> PipelineRun<C> {
    /// Total wall-clock time spent inside steps.
    pub fn elapsed(&self) -> Duration {
        self.trace.iter().map(|t| t.duration).sum()
    }
}

/// Runs step graphs.
///
/// Each step runs exactly once, in dependency order, and sees every write
/// made by the steps before it. The first failing step aborts the run and
/// the partially merged context is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineEngine;

impl PipelineEngine {
    pub fn new() -> Self {
        Self
    }

    /// Run `graph` over `initial`.
    pub async fn run<C: PipelineContext>(
        &self,
        graph: &StepGraph<C>,
        initial: C,
        config: &RuntimeConfig,
    ) -> Result<PipelineRun<C>> {
        let span = tracing::info_span!("pipeline", graph = graph.name());
        Self::execute(graph, initial, config).instrument(span).await
    }

    async fn execute<C: PipelineContext>(
        graph: &StepGraph<C>,
        mut context: C,
        config: &RuntimeConfig,
    ) -> Result<PipelineRun<C>> {
        let mut trace = Vec::with_capacity(graph.len());

        for step in graph.steps() {
            let name = step.name();

            for &field in step.reads() {
                if !context.is_set(field) {
                    return Err(GraphError::MissingInput {
                        step: name.to_string(),
                        field: format!("{field:?}"),
                    }
                    .into());
                }
            }

            let started = Instant::now();
            let outcome = match config.step_timeout() {
                Some(limit) => tokio::time::timeout(limit, step.run(&context, config))
                    .await
                    .map_err(|_| CompanionError::ReasonerTimeout {
                        step: name.to_string(),
                        after: limit,
                    })
                    .and_then(|result| result),
                None => step.run(&context, config).await,
            };

            let deltas = match outcome {
                Ok(deltas) => deltas,
                Err(e) => {
                    tracing::warn!(step = name, error = %e, "Step failed, aborting run");
                    return Err(e);
                }
            };

            let writes = deltas.len();
            for delta in deltas {
                let field = C::field_of(&delta);
                if !step.writes().contains(&field) {
                    return Err(GraphError::UndeclaredWrite {
                        step: name.to_string(),
                        field: format!("{field:?}"),
                    }
                    .into());
                }
                context.apply(delta);
            }

            let duration = started.elapsed();
            tracing::debug!(step = name, ?duration, writes, "Step complete");
            trace.push(StepTrace { step: name, duration, writes });
        }

        Ok(PipelineRun { context, trace })
    }
}
