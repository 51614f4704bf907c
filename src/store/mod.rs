//! Versioned workspace persistence.
//!
//! A store holds one container per workspace id and, inside it, one
//! independently loadable document per version. Stores are append-only in
//! practice: workflows always mint a fresh version id before saving.
//!
//! Two backends:
//! - [`FileStore`]: `<root>/<workspace>/<version>.json` (production)
//! - [`MemoryStore`]: serialized documents in memory (testing)

mod fs;
mod memory;
mod version;

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

pub use fs::FileStore;
pub use memory::MemoryStore;
pub use version::{mint_version, VersionScheme, INITIAL_VERSION};

use crate::core::{CompanionError, Result};
use crate::document::Workspace;

/// Storage backend for workspace snapshots.
///
/// Implementations must not cache: every [`load`](Self::load) observes the
/// latest committed [`save`](Self::save).
pub trait SnapshotStore: Send + Sync {
    /// All known workspace ids.
    fn list_workspaces(&self) -> Result<BTreeSet<String>>;

    /// Version ids of a workspace, oldest first. Empty if the workspace is unknown.
    fn list_versions(&self, workspace_id: &str) -> Result<Vec<String>>;

    /// Persist a snapshot under `(workspace.id, workspace.version)`.
    ///
    /// Returns a human-readable location of the written document.
    fn save(&self, workspace: &Workspace) -> Result<String>;

    /// Load a snapshot, failing with `NotFound` if it does not exist.
    fn load(&self, workspace_id: &str, version_id: &str) -> Result<Workspace>;

    /// Whether a snapshot exists.
    fn contains(&self, workspace_id: &str, version_id: &str) -> Result<bool> {
        Ok(self.list_versions(workspace_id)?.iter().any(|v| v == version_id))
    }

    /// The most recently created version of a workspace.
    fn latest_version(&self, workspace_id: &str) -> Result<Option<String>> {
        Ok(self.list_versions(workspace_id)?.pop())
    }
}

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").unwrap());

/// Reject ids that cannot be used as a single path segment.
pub fn check_identifier(id: &str) -> Result<()> {
    if IDENTIFIER.is_match(id) && !id.contains("..") {
        Ok(())
    } else {
        Err(CompanionError::InvalidIdentifier(id.to_string()))
    }
}
