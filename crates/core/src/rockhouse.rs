//! Index of the bundled offline package cache.
//!
//! The manifest is newline-delimited `name==version`, generated when the
//! unit is packaged; the sibling `rockhouse/` directory holds the
//! installable payloads it refers to. The index is read-only and loaded
//! once per start.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RockhouseError {
    #[error("cannot read rockhouse manifest '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("malformed rockhouse manifest line: '{0}'")]
    BadLine(String),
}

/// Ordered list of `(name, version)` pairs available offline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RockhouseIndex {
    entries: Vec<(String, String)>,
}

impl RockhouseIndex {
    /// Load the manifest. A missing file means the unit was bundled
    /// without an offline cache and yields an empty index.
    pub fn load(path: &Path) -> Result<Self, RockhouseError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no rockhouse manifest, using empty index");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(RockhouseError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let index = Self::parse(&content)?;
        debug!(packages = index.len(), "loaded rockhouse index");
        Ok(index)
    }

    pub fn parse(content: &str) -> Result<Self, RockhouseError> {
        let mut entries = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, version) = line
                .split_once("==")
                .ok_or_else(|| RockhouseError::BadLine(line.to_string()))?;
            let (name, version) = (name.trim(), version.trim());
            if name.is_empty() || version.is_empty() {
                return Err(RockhouseError::BadLine(line.to_string()));
            }
            entries.push((name.to_string(), version.to_string()));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All cached versions of a package, in manifest order.
    pub fn versions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.as_str() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_manifest() {
        let index = RockhouseIndex::parse(
            "# bundled offline packages\npydantic==2.5.3\nluasocket==3.1.0\n\n",
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.versions_of("pydantic").collect::<Vec<_>>(),
            vec!["2.5.3"]
        );
        assert!(index.versions_of("requests").next().is_none());
    }

    #[test]
    fn parse_rejects_malformed_lines() {
        assert!(matches!(
            RockhouseIndex::parse("not-a-pin\n"),
            Err(RockhouseError::BadLine(_))
        ));
        assert!(matches!(
            RockhouseIndex::parse("==2.0\n"),
            Err(RockhouseError::BadLine(_))
        ));
    }

    #[test]
    fn missing_manifest_is_empty() {
        let temp = TempDir::new().unwrap();
        let index = RockhouseIndex::load(&temp.path().join("rockhouse.txt")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn duplicate_names_keep_all_versions() {
        let index = RockhouseIndex::parse("pkg==1.0\npkg==2.0\n").unwrap();
        assert_eq!(index.versions_of("pkg").collect::<Vec<_>>(), vec![
            "1.0", "2.0"
        ]);
    }
}
