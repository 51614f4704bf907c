//! In-memory snapshot store.
//!
//! Documents are kept in their serialized form and parsed again on every load,
//! so callers never share mutable state with the store.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::RwLock;

use super::{check_identifier, SnapshotStore};
use crate::core::{CompanionError, Result};
use crate::document::{validate, Workspace};

/// Snapshot store that lives for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// workspace id -> (version id, JSON document) in creation order
    workspaces: RwLock<BTreeMap<String, Vec<(String, String)>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of snapshots across all workspaces.
    pub fn snapshot_count(&self) -> usize {
        self.workspaces.read().values().map(Vec::len).sum()
    }
}

impl SnapshotStore for MemoryStore {
    fn list_workspaces(&self) -> Result<BTreeSet<String>> {
        Ok(self.workspaces.read().keys().cloned().collect())
    }

    fn list_versions(&self, workspace_id: &str) -> Result<Vec<String>> {
        check_identifier(workspace_id)?;
        Ok(self
            .workspaces
            .read()
            .get(workspace_id)
            .map(|versions| versions.iter().map(|(v, _)| v.clone()).collect())
            .unwrap_or_default())
    }

    fn save(&self, workspace: &Workspace) -> Result<String> {
        check_identifier(&workspace.id)?;
        check_identifier(&workspace.version)?;

        let document = serde_json::to_string(workspace)?;
        let mut workspaces = self.workspaces.write();
        let versions = workspaces.entry(workspace.id.clone()).or_default();

        match versions.iter_mut().find(|(v, _)| v == &workspace.version) {
            Some(slot) => slot.1 = document,
            None => versions.push((workspace.version.clone(), document)),
        }

        Ok(format!("memory://{}/{}", workspace.id, workspace.version))
    }

    fn load(&self, workspace_id: &str, version_id: &str) -> Result<Workspace> {
        check_identifier(workspace_id)?;
        check_identifier(version_id)?;

        let workspaces = self.workspaces.read();
        let document = workspaces
            .get(workspace_id)
            .and_then(|versions| versions.iter().find(|(v, _)| v == version_id))
            .map(|(_, doc)| doc.as_str())
            .ok_or_else(|| CompanionError::not_found(workspace_id, version_id))?;

        let raw: serde_json::Value = serde_json::from_str(document)?;
        validate(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_a_copy() {
        let store = MemoryStore::new();
        let mut ws = Workspace::empty("ws1", "v1");
        ws.problem_space.goal = "goal".to_string();
        store.save(&ws).unwrap();

        let mut loaded = store.load("ws1", "v1").unwrap();
        loaded.problem_space.goal = "mutated".to_string();

        assert_eq!(store.load("ws1", "v1").unwrap().problem_space.goal, "goal");
    }

    #[test]
    fn test_versions_keep_insertion_order() {
        let store = MemoryStore::new();
        for version in ["v2", "v1", "v10"] {
            store.save(&Workspace::empty("ws1", version)).unwrap();
        }
        store.save(&Workspace::empty("ws1", "v1")).unwrap();

        assert_eq!(store.list_versions("ws1").unwrap(), vec!["v2", "v1", "v10"]);
        assert_eq!(store.snapshot_count(), 3);
        assert!(store.contains("ws1", "v10").unwrap());
    }

    #[test]
    fn test_missing_snapshot() {
        let store = MemoryStore::new();
        assert!(store.list_versions("ws1").unwrap().is_empty());
        assert!(store.latest_version("ws1").unwrap().is_none());
        assert!(store.load("ws1", "v1").unwrap_err().is_not_found());
    }
}
