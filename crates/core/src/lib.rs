//! anyunit-core: the self-persisting bootstrap engine.
//!
//! Every start runs the same sequence: ensure the pristine source
//! snapshot exists (capturing it into the unit's state document exactly
//! once), reconcile installed packages against the requested set,
//! materialize the snapshot merged with the caller's override set into
//! the live source directory, and hand the result to the extension
//! runtime. Persistent state lives in a single assignment-per-line text
//! document updated through one atomic rewrite primitive.

mod bootstrap;
mod config;
mod paths;
mod provision;
mod reconcile;
mod requirement;
mod rockhouse;
mod snapshot;
mod state;

pub use bootstrap::{bootstrap, BootstrapError};
pub use config::{ConfigError, UnitConfig};
pub use paths::{UnitPaths, STATE_FILE_NAME};
pub use provision::{provision, Installer, LuaRocksInstaller, ProvisionError, INSTALLED_KEY};
pub use reconcile::{effective_tree, materialize, ReconcileError};
pub use requirement::{
    compare_versions, parse_requirement, parse_requirements, CmpOp, Constraint, Requirement,
    RequirementError,
};
pub use rockhouse::{RockhouseError, RockhouseIndex};
pub use snapshot::{ensure_snapshot, Snapshot, SnapshotError, ORIGINAL_KEY};
pub use state::{StateError, StateFile};
