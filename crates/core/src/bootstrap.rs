//! The per-start bootstrap sequence.

use thiserror::Error;
use tracing::info;

use crate::config::UnitConfig;
use crate::paths::UnitPaths;
use crate::provision::{provision, Installer, ProvisionError};
use crate::reconcile::{effective_tree, materialize, ReconcileError};
use crate::snapshot::{ensure_snapshot, SnapshotError};
use crate::state::{StateError, StateFile};

/// Any fatal failure of the bootstrap phases. None of these are caught
/// and masked here; the process entry point surfaces them as a non-zero
/// exit so the host framework can report the unit as errored.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("state integrity failure: {0}")]
    State(#[from] StateError),

    #[error("snapshot failure: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("provisioning failure: {0}")]
    Provision(#[from] ProvisionError),

    #[error("reconciliation failure: {0}")]
    Reconcile(#[from] ReconcileError),
}

/// Run the bootstrap phases strictly in order: snapshot, provision,
/// reconcile. Each phase completes all of its side effects before the
/// next begins. Loading the extension happens in the caller afterwards.
pub fn bootstrap<I: Installer>(
    paths: &UnitPaths,
    config: &UnitConfig,
    installer: &mut I,
) -> Result<(), BootstrapError> {
    let mut state = StateFile::open(&paths.state_file)?;

    let snapshot = ensure_snapshot(&paths.src_dir, &mut state)?;
    provision(paths, &mut state, &config.packages, installer)?;

    let tree = effective_tree(&snapshot, &config.src_overwrite);
    materialize(&tree, &paths.src_dir, &paths.state_file)?;

    info!(
        files = tree.len(),
        overrides = config.src_overwrite.len(),
        "bootstrap complete"
    );
    Ok(())
}
