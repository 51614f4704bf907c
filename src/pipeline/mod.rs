//! Dataflow engine for staged document refinement.
//!
//! A workflow is a [`StepGraph`]: named [`Step`]s that declare which context
//! fields they read and write. The builder orders steps topologically from
//! those declarations and rejects cycles and conflicting writers up front.
//! [`PipelineEngine`] then runs the steps one at a time over a typed
//! [`PipelineContext`], merging each step's deltas before the next starts.
//!
//! Conditional behaviour lives inside a step (pass-through vs. transform), so
//! the graph shape never changes between runs.

mod engine;
mod graph;
mod runtime;

pub use engine::{PipelineEngine, PipelineRun, StepTrace};
pub use graph::{required, GraphError, PipelineContext, Step, StepGraph, StepGraphBuilder};
pub use runtime::RuntimeConfig;
