//! Package provisioning against the rockhouse and the remote index.
//!
//! Specifiers satisfiable from the bundled offline cache are installed
//! from it; everything else (URLs, extras, uncached names or versions)
//! resolves against the remote index. Both groups land in the dependency
//! directory, which is wiped and rebuilt for every distinct request, and
//! the request string is committed to the state file only after the
//! installer succeeds, so an interrupted run self-corrects on the next
//! start.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

use crate::paths::UnitPaths;
use crate::requirement::{parse_requirements, CmpOp, Requirement, RequirementError};
use crate::rockhouse::{RockhouseError, RockhouseIndex};
use crate::state::{StateError, StateFile};

/// State-file slot holding the last fully installed request string.
pub const INSTALLED_KEY: &str = "installed";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Requirement(#[from] RequirementError),

    #[error(transparent)]
    Rockhouse(#[from] RockhouseError),

    #[error("cannot rebuild dependency directory '{path}': {source}")]
    TargetDir { path: PathBuf, source: io::Error },

    #[error("cannot run package installer '{program}': {source}")]
    Spawn { program: String, source: io::Error },

    #[error("package installer exited with {code:?} for '{spec}': {stderr}")]
    InstallFailed {
        spec: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Seam for the actual install mechanism, so tests can assert routing
/// without spawning processes.
pub trait Installer {
    /// Install specifiers from the bundled offline cache only.
    fn install_local(
        &mut self,
        requirements: &[Requirement],
        rockhouse: &Path,
        target: &Path,
    ) -> Result<(), ProvisionError>;

    /// Install specifiers from the remote package index.
    fn install_remote(
        &mut self,
        requirements: &[Requirement],
        target: &Path,
    ) -> Result<(), ProvisionError>;
}

/// Installs packages by shelling out to `luarocks`, one specifier at a
/// time, blocking on each invocation and checking its exit status.
#[derive(Debug, Clone)]
pub struct LuaRocksInstaller {
    program: String,
}

impl LuaRocksInstaller {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, command: &mut Command, spec: &str) -> Result<(), ProvisionError> {
        debug!(spec, "running package installer");
        let output = command.output().map_err(|e| ProvisionError::Spawn {
            program: self.program.clone(),
            source: e,
        })?;
        if !output.status.success() {
            return Err(ProvisionError::InstallFailed {
                spec: spec.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn base_command(&self, target: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("install").arg("--tree").arg(target);
        command
    }
}

impl Default for LuaRocksInstaller {
    fn default() -> Self {
        Self::new("luarocks")
    }
}

impl Installer for LuaRocksInstaller {
    fn install_local(
        &mut self,
        requirements: &[Requirement],
        rockhouse: &Path,
        target: &Path,
    ) -> Result<(), ProvisionError> {
        for req in requirements {
            let mut command = self.base_command(target);
            command.arg("--only-server").arg(rockhouse).arg(&req.name);
            if let Some(c) = &req.constraint {
                if c.op == CmpOp::Eq {
                    command.arg(&c.version);
                }
            }
            self.run(&mut command, &req.raw)?;
        }
        Ok(())
    }

    fn install_remote(
        &mut self,
        requirements: &[Requirement],
        target: &Path,
    ) -> Result<(), ProvisionError> {
        for req in requirements {
            let mut command = self.base_command(target);
            match &req.url {
                Some(url) => {
                    command.arg(url);
                }
                None => {
                    command.arg(&req.name);
                    if let Some(c) = &req.constraint {
                        if c.op == CmpOp::Eq {
                            command.arg(&c.version);
                        }
                    }
                }
            }
            self.run(&mut command, &req.raw)?;
        }
        Ok(())
    }
}

/// Reconcile installed packages against the requested set.
///
/// Returns `true` when an installation run happened. Nothing happens at
/// all when the trimmed request equals the persisted `installed` value.
pub fn provision<I: Installer>(
    paths: &UnitPaths,
    state: &mut StateFile,
    requested: &str,
    installer: &mut I,
) -> Result<bool, ProvisionError> {
    let requested = requested.trim();
    let installed: String = state.get(INSTALLED_KEY)?;
    if requested == installed {
        debug!("requested package set unchanged, skipping install");
        return Ok(false);
    }

    let requirements = parse_requirements(requested)?;
    let index = RockhouseIndex::load(&paths.rockhouse_manifest)?;

    let (local, remote): (Vec<Requirement>, Vec<Requirement>) = requirements
        .into_iter()
        .partition(|r| r.satisfiable_from(index.versions_of(&r.name)));

    rebuild_target_dir(&paths.deps_dir)?;

    if !local.is_empty() {
        let specs: Vec<&str> = local.iter().map(|r| r.raw.as_str()).collect();
        info!(packages = ?specs, "installing packages from rockhouse");
        installer.install_local(&local, &paths.rockhouse_dir, &paths.deps_dir)?;
    }
    if !remote.is_empty() {
        let specs: Vec<&str> = remote.iter().map(|r| r.raw.as_str()).collect();
        info!(packages = ?specs, "installing packages from remote index");
        installer.install_remote(&remote, &paths.deps_dir)?;
    }

    state.set(INSTALLED_KEY, &requested)?;
    Ok(true)
}

/// Wipe and recreate the dependency directory, so no partial state from
/// an earlier or interrupted run survives.
fn rebuild_target_dir(dir: &Path) -> Result<(), ProvisionError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(ProvisionError::TargetDir {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    }
    fs::create_dir_all(dir).map_err(|e| ProvisionError::TargetDir {
        path: dir.to_path_buf(),
        source: e,
    })
}
