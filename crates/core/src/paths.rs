//! Filesystem layout of a deployed unit.

use std::path::{Path, PathBuf};

/// File name of the unit state document inside the live source directory.
pub const STATE_FILE_NAME: &str = "anyunit.state";

/// Fixed layout beneath a unit directory.
///
/// ```text
/// <unit>/
/// ├── src/                # live source tree, incl. the state file
/// │   └── anyunit.state
/// ├── deps/               # provisioned packages, rebuilt per package set
/// ├── rockhouse/          # bundled offline package payloads
/// └── rockhouse.txt       # offline cache manifest (name==version lines)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    pub unit_dir: PathBuf,
    pub src_dir: PathBuf,
    pub deps_dir: PathBuf,
    pub state_file: PathBuf,
    pub rockhouse_dir: PathBuf,
    pub rockhouse_manifest: PathBuf,
}

impl UnitPaths {
    pub fn new(unit_dir: impl Into<PathBuf>) -> Self {
        let unit_dir = unit_dir.into();
        let src_dir = unit_dir.join("src");
        Self {
            state_file: src_dir.join(STATE_FILE_NAME),
            deps_dir: unit_dir.join("deps"),
            rockhouse_dir: unit_dir.join("rockhouse"),
            rockhouse_manifest: unit_dir.join("rockhouse.txt"),
            src_dir,
            unit_dir,
        }
    }

    /// The unit directory this layout was built from.
    pub fn root(&self) -> &Path {
        &self.unit_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_fixed() {
        let paths = UnitPaths::new("/var/lib/unit-0");
        assert_eq!(paths.src_dir, PathBuf::from("/var/lib/unit-0/src"));
        assert_eq!(
            paths.state_file,
            PathBuf::from("/var/lib/unit-0/src/anyunit.state")
        );
        assert_eq!(paths.deps_dir, PathBuf::from("/var/lib/unit-0/deps"));
        assert_eq!(
            paths.rockhouse_manifest,
            PathBuf::from("/var/lib/unit-0/rockhouse.txt")
        );
    }
}
