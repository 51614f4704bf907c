//! Interactive session state.
//!
//! A [`Session`] remembers which workspace version a user is looking at and
//! keeps a transcript of the exchange. It is also the single-writer guard for
//! its workspace: a second request while one is running fails with `Busy`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{load_or_default, Companion};
use crate::core::{CompanionError, Result};
use crate::document::Workspace;
use crate::store::INITIAL_VERSION;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    System,
}

/// One line of the session transcript.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Result of a session request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new version was written and the session moved to it
    Updated { previous: String, version: String },

    /// Nothing changed; the session stays where it was
    Unchanged { version: String },
}

impl Outcome {
    /// The version the session is on after the request.
    pub fn version(&self) -> &str {
        match self {
            Self::Updated { version, .. } | Self::Unchanged { version } => version,
        }
    }
}

struct SessionState {
    version_id: String,
    transcript: Vec<TranscriptEntry>,
}

/// One user's view of one workspace.
pub struct Session {
    companion: Arc<Companion>,
    workspace_id: String,
    state: Mutex<SessionState>,
    processing: AtomicBool,
}

/// Clears the processing flag when a request finishes or is dropped.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Session {
    /// Open a session at a specific version.
    pub fn new(
        companion: Arc<Companion>,
        workspace_id: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        Self {
            companion,
            workspace_id: workspace_id.into(),
            state: Mutex::new(SessionState {
                version_id: version_id.into(),
                transcript: Vec::new(),
            }),
            processing: AtomicBool::new(false),
        }
    }

    /// Open a session at the latest version of a workspace, or at the initial
    /// version if it has none yet.
    pub fn resume(companion: Arc<Companion>, workspace_id: impl Into<String>) -> Result<Self> {
        let workspace_id = workspace_id.into();
        let version = companion
            .latest_version(&workspace_id)?
            .unwrap_or_else(|| INITIAL_VERSION.to_string());
        Ok(Self::new(companion, workspace_id, version))
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn version_id(&self) -> String {
        self.state.lock().version_id.clone()
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.state.lock().transcript.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// The snapshot the session is on, empty if it was never saved.
    pub fn current(&self) -> Result<Workspace> {
        load_or_default(self.companion.store(), &self.workspace_id, &self.version_id())
    }

    /// Refine the problem space with a user message.
    pub async fn submit(&self, text: &str, remove_solutions: bool) -> Result<Outcome> {
        let _guard = self.begin()?;
        self.record(Role::User, text);

        let previous = self.version_id();
        let result = self
            .companion
            .run_problem_workflow(&self.workspace_id, &previous, text, remove_solutions)
            .await;

        self.finish(previous, result)
    }

    /// Generate one more solution candidate.
    pub async fn generate(&self) -> Result<Outcome> {
        let _guard = self.begin()?;
        self.record(Role::User, "Generate a solution candidate");

        let previous = self.version_id();
        let result = self.companion.run_solution_workflow(&self.workspace_id, &previous).await;

        self.finish(previous, result)
    }

    fn begin(&self) -> Result<ProcessingGuard<'_>> {
        if self.processing.swap(true, Ordering::AcqRel) {
            return Err(CompanionError::Busy(self.workspace_id.clone()));
        }
        Ok(ProcessingGuard(&self.processing))
    }

    fn record(&self, role: Role, content: impl Into<String>) {
        self.state.lock().transcript.push(TranscriptEntry {
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    fn finish(&self, previous: String, result: Result<String>) -> Result<Outcome> {
        match result {
            Ok(version) if version != previous => {
                self.state.lock().version_id = version.clone();
                self.record(Role::System, format!("Updated to version {version}"));
                Ok(Outcome::Updated { previous, version })
            }
            Ok(version) => {
                self.record(Role::System, "No changes detected");
                Ok(Outcome::Unchanged { version })
            }
            Err(e) => {
                self.record(Role::System, format!("Error: {e}"));
                Err(e)
            }
        }
    }
}
