//! Materializing the effective source tree for a start.
//!
//! Runs unconditionally on every start: the override set may differ
//! between starts, and rewriting from the snapshot is exactly what makes
//! clearing the overrides a reliable recovery procedure.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::snapshot::Snapshot;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("source entry '{0}' escapes the source directory")]
    InvalidPath(String),

    #[error("cannot write source file '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Merge the override set over the snapshot. Overrides replace same-path
/// snapshot entries; unique paths from either side are kept.
pub fn effective_tree(
    snapshot: &Snapshot,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut tree = snapshot.clone();
    for (path, content) in overrides {
        tree.insert(path.clone(), content.clone());
    }
    tree
}

/// Write every entry of the effective tree beneath `src_dir`, creating
/// parent directories as needed.
///
/// The protected path (the unit's own state document) is never written,
/// no matter what the tree contains; entries that are absolute or resolve
/// outside the source directory are rejected outright.
pub fn materialize(
    tree: &BTreeMap<String, String>,
    src_dir: &Path,
    protected: &Path,
) -> Result<(), ReconcileError> {
    for (rel, content) in tree {
        let rel_path =
            normalize_relative(rel).ok_or_else(|| ReconcileError::InvalidPath(rel.clone()))?;
        let dest = src_dir.join(rel_path);
        if dest == protected {
            debug!(path = %rel, "skipping protected state file");
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ReconcileError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(&dest, content).map_err(|e| ReconcileError::Write {
            path: dest.clone(),
            source: e,
        })?;
    }
    debug!(files = tree.len(), "materialized effective tree");
    Ok(())
}

/// Normalize a `/`-separated relative path, dropping `.` components and
/// resolving `..` inward only. Absolute paths and paths that escape
/// upward yield `None`.
fn normalize_relative(rel: &str) -> Option<PathBuf> {
    let mut components = Vec::new();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(part) => components.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                components.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if components.is_empty() {
        None
    } else {
        Some(components.iter().collect())
    }
}
