//! Filesystem snapshot store.
//!
//! Layout:
//!
//! ```text
//! <root>/
//!   <workspace_id>/
//!     versions.log        one version id per line, in creation order
//!     <version_id>.json   pretty-printed Workspace document
//! ```
//!
//! Documents are written to a temporary file in the same directory and renamed
//! into place, so readers never observe a partial document.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;
use tempfile::NamedTempFile;

use super::{check_identifier, SnapshotStore};
use crate::core::{CompanionError, Result};
use crate::document::{validate, Workspace};

const VERSION_LOG: &str = "versions.log";
const EXTENSION: &str = "json";

/// Snapshot store backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn workspace_dir(&self, workspace_id: &str) -> Result<PathBuf> {
        check_identifier(workspace_id)?;
        Ok(self.root.join(workspace_id))
    }

    fn version_path(&self, workspace_id: &str, version_id: &str) -> Result<PathBuf> {
        check_identifier(version_id)?;
        Ok(self.workspace_dir(workspace_id)?.join(format!("{version_id}.{EXTENSION}")))
    }

    fn read_log(dir: &Path) -> Result<Vec<String>> {
        let path = dir.join(VERSION_LOG);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path)?;
        Ok(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect())
    }

    fn append_log(dir: &Path, version_id: &str) -> Result<()> {
        let mut log = OpenOptions::new().create(true).append(true).open(dir.join(VERSION_LOG))?;
        writeln!(log, "{version_id}")?;
        log.sync_data()?;
        Ok(())
    }

    /// Version files present on disk, oldest modification first.
    fn scan_versions(dir: &Path) -> Result<Vec<String>> {
        let mut found: Vec<(SystemTime, String)> = Vec::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let modified = fs::metadata(&path)?.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, stem.to_string()));
        }

        found.sort();
        Ok(found.into_iter().map(|(_, stem)| stem).collect())
    }
}

impl SnapshotStore for FileStore {
    fn list_workspaces(&self) -> Result<BTreeSet<String>> {
        if !self.root.is_dir() {
            return Ok(BTreeSet::new());
        }

        let mut workspaces = BTreeSet::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    workspaces.insert(name.to_string());
                }
            }
        }

        Ok(workspaces)
    }

    fn list_versions(&self, workspace_id: &str) -> Result<Vec<String>> {
        let dir = self.workspace_dir(workspace_id)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let on_disk = Self::scan_versions(&dir)?;

        // The log fixes creation order; files it does not know about (copied in
        // by hand, or written before the log existed) follow by mtime.
        let mut versions: Vec<String> = Vec::with_capacity(on_disk.len());
        for version in Self::read_log(&dir)? {
            if on_disk.contains(&version) && !versions.contains(&version) {
                versions.push(version);
            }
        }
        for version in on_disk {
            if !versions.contains(&version) {
                versions.push(version);
            }
        }

        Ok(versions)
    }

    fn save(&self, workspace: &Workspace) -> Result<String> {
        let path = self.version_path(&workspace.id, &workspace.version)?;
        let dir = self.workspace_dir(&workspace.id)?;
        fs::create_dir_all(&dir)?;

        let existed = path.exists();
        let content = serde_json::to_string_pretty(workspace)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CompanionError::Io(e.error))?;

        if !existed {
            Self::append_log(&dir, &workspace.version)?;
        }

        tracing::debug!(
            workspace = workspace.id,
            version = workspace.version,
            path = %path.display(),
            "Saved workspace snapshot"
        );

        Ok(path.display().to_string())
    }

    fn load(&self, workspace_id: &str, version_id: &str) -> Result<Workspace> {
        let path = self.version_path(workspace_id, version_id)?;
        if !path.is_file() {
            return Err(CompanionError::not_found(workspace_id, version_id));
        }

        let content = fs::read_to_string(&path)?;
        let raw: Value = serde_json::from_str(&content).map_err(|e| {
            CompanionError::MalformedDocument(format!("{}: {e}", path.display()))
        })?;

        let mut workspace: Workspace = validate(&raw)?;

        // The storage key is authoritative.
        if workspace.id != workspace_id || workspace.version != version_id {
            tracing::warn!(
                path = %path.display(),
                stored_id = workspace.id,
                stored_version = workspace.version,
                "Snapshot key does not match document; using storage key"
            );
            workspace.id = workspace_id.to_string();
            workspace.version = version_id.to_string();
        }

        Ok(workspace)
    }
}
