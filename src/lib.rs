#![allow(clippy::format_push_string)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]

//! # Design Companion
//!
//! Staged refinement of system design documents with versioned persistence.
//!
//! A user describes a system in free text. The companion structures it into a
//! **problem space** (context, invariants, goal, problem, variants), checks it
//! for consistency, refines it when needed, and then derives a **solution
//! space** of candidate architectures with a comparison and recommendation.
//!
//! Every change is committed as a new immutable version of the workspace;
//! a run that changes nothing returns the version it started from.
//!
//! ## Layout
//!
//! - [`document`]: problem/solution documents, validation, candidate ids
//! - [`store`]: versioned snapshot persistence
//! - [`pipeline`]: step graph engine
//! - [`ai`]: reasoning backends
//! - [`workflow`]: the refinement and generation workflows
//!
//! ## Quick Start
//!
//! ```bash
//! # Start a workspace and describe the system
//! companion new
//! companion refine <workspace> v1 "We need to scale payments to 50k TPS on-premise"
//!
//! # Generate a solution candidate from the latest version
//! companion solve <workspace> v2
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::use_self)]

pub mod ai;
pub mod core;
pub mod document;
pub mod pipeline;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use ai::{PromptKind, Reasoner, ReasonerChain, ScriptedReasoner};
pub use core::{CompanionError, Config, Result};
pub use document::{ProblemSpace, SolutionCandidate, SolutionSpace, Workspace};
pub use pipeline::{PipelineEngine, RuntimeConfig};
pub use store::{FileStore, MemoryStore, SnapshotStore};
pub use workflow::{Companion, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "companion";
