//! Step declarations and dependency ordering.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use thiserror::Error;

use super::runtime::RuntimeConfig;
use crate::core::Result;

/// Errors raised while building or running a step graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Read/write dependencies form a cycle.
    #[error("Graph '{graph}' has a dependency cycle through step '{step}'")]
    Cycle { graph: String, step: String },

    /// Two steps declare the same output field.
    #[error("Field {field} is written by both '{first}' and '{second}'")]
    DuplicateWriter { field: String, first: String, second: String },

    /// A step was about to run but one of its inputs was never set.
    #[error("Step '{step}' requires {field}, which is not set")]
    MissingInput { step: String, field: String },

    /// A step returned a delta for a field it did not declare.
    #[error("Step '{step}' wrote undeclared field {field}")]
    UndeclaredWrite { step: String, field: String },
}

/// Shared state threaded through a pipeline run.
///
/// Each workflow defines its own context struct with a field enum naming its
/// slots and a delta enum carrying one write to one slot.
pub trait PipelineContext: Send + Sync + 'static {
    /// Names of the context slots.
    type Field: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// A single write produced by a step.
    type Delta: Send + 'static;

    /// Whether the slot currently holds a value.
    fn is_set(&self, field: Self::Field) -> bool;

    /// The slot a delta writes.
    fn field_of(delta: &Self::Delta) -> Self::Field;

    /// Merge a delta into the context.
    fn apply(&mut self, delta: Self::Delta);
}

/// A named transformation over a pipeline context.
#[async_trait]
pub trait Step<C: PipelineContext>: Send + Sync {
    /// Step name, unique within a graph.
    fn name(&self) -> &'static str;

    /// Fields that must be set before the step runs.
    fn reads(&self) -> &[C::Field];

    /// Fields the step may write.
    fn writes(&self) -> &[C::Field];

    /// Run the step against a read-only view of the context.
    async fn run(&self, ctx: &C, config: &RuntimeConfig) -> Result<Vec<C::Delta>>;
}

/// Borrow an optional context slot, failing with `MissingInput` if it is empty.
pub fn required<'a, T, F: Debug>(value: &'a Option<T>, step: &str, field: F) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| {
        GraphError::MissingInput { step: step.to_string(), field: format!("{field:?}") }.into()
    })
}

/// Steps in dependency order.
pub struct StepGraph<C: PipelineContext> {
    name: String,
    steps: Vec<Box<dyn Step<C>>>,
}

impl<C: PipelineContext> StepGraph<C> {
    /// Start building a graph.
    pub fn builder(name: impl Into<String>) -> StepGraphBuilder<C> {
        StepGraphBuilder { name: name.into(), steps: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps in execution order.
    pub fn steps(&self) -> &[Box<dyn Step<C>>] {
        &self.steps
    }

    /// Step names in execution order.
    pub fn order(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Collects steps and orders them by their declared reads and writes.
pub struct StepGraphBuilder<C: PipelineContext> {
    name: String,
    steps: Vec<Box<dyn Step<C>>>,
}

impl<C: PipelineContext> StepGraphBuilder<C> {
    /// Add a step. Insertion order does not determine execution order.
    pub fn step(mut self, step: impl Step<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Resolve dependencies and produce an executable graph.
    pub fn build(self) -> std::result::Result<StepGraph<C>, GraphError> {
        let Self { name, steps } = self;

        let mut writers: HashMap<C::Field, usize> = HashMap::new();
        for (index, step) in steps.iter().enumerate() {
            for &field in step.writes() {
                if let Some(&first) = writers.get(&field) {
                    return Err(GraphError::DuplicateWriter {
                        field: format!("{field:?}"),
                        first: steps[first].name().to_string(),
                        second: step.name().to_string(),
                    });
                }
                writers.insert(field, index);
            }
        }

        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
        for index in 0..steps.len() {
            graph.add_node(index);
        }
        for (index, step) in steps.iter().enumerate() {
            for field in step.reads() {
                // Fields without a writer are inputs supplied by the caller.
                let Some(&writer) = writers.get(field) else {
                    continue;
                };
                if writer == index {
                    return Err(GraphError::Cycle {
                        graph: name,
                        step: step.name().to_string(),
                    });
                }
                graph.add_edge(writer, index, ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| GraphError::Cycle {
            graph: name.clone(),
            step: steps[cycle.node_id()].name().to_string(),
        })?;

        let mut slots: Vec<Option<Box<dyn Step<C>>>> = steps.into_iter().map(Some).collect();
        let steps = order.into_iter().filter_map(|index| slots[index].take()).collect();

        Ok(StepGraph { name, steps })
    }
}
