//! Error types shared across the companion.

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::GraphError;

/// Result type for companion operations.
pub type Result<T> = std::result::Result<T, CompanionError>;

/// Errors that can occur while loading, refining or persisting workspaces.
#[derive(Debug, Error)]
pub enum CompanionError {
    /// The requested workspace version does not exist.
    #[error("Workspace version not found: {workspace}/{version}")]
    NotFound { workspace: String, version: String },

    /// A stored or reasoner-produced document failed schema validation.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A workspace or version identifier cannot be used as a storage key.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// The reasoning backend failed.
    #[error("Reasoner failure: {0}")]
    ReasonerFailure(String),

    /// A step exceeded the run-level deadline.
    #[error("Step '{step}' timed out after {}s", after.as_secs_f32())]
    ReasonerTimeout { step: String, after: Duration },

    /// The solution space is already at the candidate limit.
    #[error("Solution space already holds {count} candidates (limit {limit})")]
    CapacityExceeded { count: usize, limit: usize },

    /// A session is already processing a request.
    #[error("Session for workspace '{0}' is already processing a request")]
    Busy(String),

    /// The configuration names an unknown or unusable backend.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The step graph is invalid or was run with missing inputs.
    #[error("Invalid step graph: {0}")]
    Graph(#[from] GraphError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CompanionError {
    /// Create a not-found error for a workspace version.
    pub fn not_found(workspace: impl Into<String>, version: impl Into<String>) -> Self {
        Self::NotFound { workspace: workspace.into(), version: version.into() }
    }

    /// Whether this error means the requested version is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
