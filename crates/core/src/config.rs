//! The unit configuration surface supplied by the host framework.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read unit config '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("malformed unit config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Configuration keys consumed by the bootstrap engine.
///
/// Both keys default to empty: an unconfigured unit runs its pristine
/// snapshot with no extra packages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UnitConfig {
    /// Free-text package requirement list, one specifier per line.
    pub packages: String,

    /// Relative file path → full content, applied over the snapshot on
    /// every start.
    pub src_overwrite: BTreeMap<String, String>,
}

impl UnitConfig {
    /// Load from a JSON document. A missing file yields the default
    /// (empty) configuration; a malformed one is fatal.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no unit config, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_full_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{"packages": "pydantic\n", "src-overwrite": {"unit.lua": "return {}"}}"#,
        )
        .unwrap();

        let config = UnitConfig::load(&path).unwrap();
        assert_eq!(config.packages, "pydantic\n");
        assert_eq!(
            config.src_overwrite.get("unit.lua").map(String::as_str),
            Some("return {}")
        );
    }

    #[test]
    fn missing_file_defaults_to_empty() {
        let temp = TempDir::new().unwrap();
        let config = UnitConfig::load(&temp.path().join("absent.json")).unwrap();
        assert_eq!(config, UnitConfig::default());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"packages": "requests==2.31.0"}"#).unwrap();

        let config = UnitConfig::load(&path).unwrap();
        assert_eq!(config.packages, "requests==2.31.0");
        assert!(config.src_overwrite.is_empty());
    }

    #[test]
    fn malformed_config_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            UnitConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
