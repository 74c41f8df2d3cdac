//! One-time capture of the unit's pristine source tree.
//!
//! The first start enumerates the live source directory and persists the
//! result into the state file's `original` slot. Every later start loads
//! the persisted mapping as-is; the filesystem is never re-enumerated, so
//! whatever overrides have been materialized since cannot leak into the
//! snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::state::{StateError, StateFile};

/// State-file slot holding the pristine source tree.
pub const ORIGINAL_KEY: &str = "original";

/// Relative `/`-separated path → full text content.
pub type Snapshot = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("cannot walk source directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("cannot read source file '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("source path '{0}' is not valid unicode")]
    NonUnicodePath(PathBuf),
}

/// Load the persisted snapshot, capturing it first on the unit's first
/// start.
///
/// Capture walks `src_dir` recursively, reading every file except the
/// state file itself. Once the snapshot is non-empty it is never
/// recomputed.
pub fn ensure_snapshot(src_dir: &Path, state: &mut StateFile) -> Result<Snapshot, SnapshotError> {
    let existing: Snapshot = state.get(ORIGINAL_KEY)?;
    if !existing.is_empty() {
        debug!(files = existing.len(), "using persisted snapshot");
        return Ok(existing);
    }

    let state_path = state.path().to_path_buf();
    let snapshot = capture(src_dir, &state_path)?;
    state.set(ORIGINAL_KEY, &snapshot)?;
    info!(files = snapshot.len(), "captured pristine source snapshot");
    Ok(snapshot)
}

fn capture(src_dir: &Path, state_path: &Path) -> Result<Snapshot, SnapshotError> {
    let mut snapshot = Snapshot::new();

    for entry in WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.path() == state_path {
            continue;
        }

        let rel = match entry.path().strip_prefix(src_dir) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let rel = rel
            .to_str()
            .ok_or_else(|| SnapshotError::NonUnicodePath(rel.to_path_buf()))?;
        let key = rel.replace(std::path::MAIN_SEPARATOR, "/");

        let content = fs::read_to_string(entry.path()).map_err(|e| SnapshotError::Read {
            path: entry.path().to_path_buf(),
            source: e,
        })?;
        snapshot.insert(key, content);
    }

    Ok(snapshot)
}
