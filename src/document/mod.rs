//! Workspace documents.
//!
//! Two document kinds make up a [`Workspace`]: the [`ProblemSpace`] the user
//! refines and the optional [`SolutionSpace`] derived from it.
//!
//! ## Change detection
//!
//! Workflows compare whole documents with [`equal`]; there is no field-level
//! diffing and no timestamps.

mod allocator;
mod model;
mod render;
mod validate;

pub use allocator::{dedup_by_id, sanitize, CandidateAllocator};
pub use model::{equal, Comparison, ProblemSpace, SolutionCandidate, SolutionSpace, Workspace};
pub use render::{render_problem_space, render_solution_space, render_workspace};
pub use validate::{validate, validate_problem_space, validate_solution_space, Document};
