//! Version id minting.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::{CompanionError, Result};

/// Parent version used for a workspace that has never been saved.
pub const INITIAL_VERSION: &str = "v0";

/// How new version ids are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionScheme {
    /// `v1`, `v2`, ... one past the highest numbered version seen
    #[default]
    Sequential,

    /// Eight hex characters from a random UUID
    Random,
}

static SEQUENTIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v(\d+)$").unwrap());

/// Mint a version id that does not collide with `existing`.
///
/// The sequential scheme considers both the existing versions and the parent,
/// so saving from `v0` into an empty workspace yields `v1`. It fails with
/// `InvalidIdentifier` when the highest number cannot be incremented.
pub fn mint_version(scheme: VersionScheme, existing: &[String], parent: &str) -> Result<String> {
    match scheme {
        VersionScheme::Sequential => {
            let max = existing
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(parent))
                .filter_map(sequence_number)
                .max()
                .unwrap_or(0);

            // One past the highest number seen cannot already exist.
            max.checked_add(1)
                .map(|next| format!("v{next}"))
                .ok_or_else(|| CompanionError::InvalidIdentifier(format!("v{max}")))
        }
        VersionScheme::Random => loop {
            let candidate = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
            if !existing.contains(&candidate) {
                return Ok(candidate);
            }
        },
    }
}

fn sequence_number(version: &str) -> Option<u64> {
    SEQUENTIAL.captures(version).and_then(|caps| caps[1].parse().ok())
}
