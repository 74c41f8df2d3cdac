//! The unit state file and the assignment-rewrite primitive.
//!
//! All persistent engine state lives in a single text document of
//! top-level `name = <json value>` assignments, seeded when the unit is
//! packaged. An update locates the unique assignment for a target name,
//! replaces only its value span, and rewrites the file in full through a
//! temp file + rename in the same directory, so an interrupted rewrite
//! leaves the previous content intact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Errors raised by the state file.
///
/// Every one of these means the unit's persistent state can no longer be
/// trusted; callers abort startup rather than retry.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot read state file '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write state file '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("no top-level assignment to '{0}' in state file")]
    MissingAssignment(String),

    #[error("more than one top-level assignment to '{0}' in state file")]
    DuplicateAssignment(String),

    #[error("unterminated value in assignment to '{0}' in state file")]
    UnterminatedValue(String),

    #[error("invalid value in assignment to '{name}': {source}")]
    Parse {
        name: String,
        source: serde_json::Error,
    },

    #[error("cannot serialize value for '{name}': {source}")]
    Serialize {
        name: String,
        source: serde_json::Error,
    },
}

/// Handle on the unit's state document.
///
/// Holds the full source text in memory; `set` keeps the in-memory copy
/// and the on-disk file in sync.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    source: String,
}

impl StateFile {
    /// Open the state file, reading its full text.
    ///
    /// A missing or unreadable file is fatal: the state document is the
    /// unit's only persistence substrate.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let source = fs::read_to_string(&path).map_err(|e| StateError::Read {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path, source })
    }

    /// Path of the underlying document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the value currently assigned to `name`.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, StateError> {
        let span = locate_assignment(&self.source, name)?;
        serde_json::from_str(&self.source[span.start..span.end]).map_err(|e| StateError::Parse {
            name: name.to_string(),
            source: e,
        })
    }

    /// Replace the value assigned to `name` and rewrite the file.
    ///
    /// Only the located value span changes; every byte outside it is
    /// preserved. Rewriting with an unchanged value produces identical
    /// file content, so repeated calls across restarts are harmless.
    pub fn set<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), StateError> {
        let span = locate_assignment(&self.source, name)?;
        let serialized = serde_json::to_string(value).map_err(|e| StateError::Serialize {
            name: name.to_string(),
            source: e,
        })?;

        let mut rewritten = String::with_capacity(self.source.len() + serialized.len());
        rewritten.push_str(&self.source[..span.start]);
        rewritten.push_str(&serialized);
        rewritten.push_str(&self.source[span.end..]);

        self.write_atomic(&rewritten)?;
        self.source = rewritten;
        debug!(name, "state assignment rewritten");
        Ok(())
    }

    /// Write to a temp file in the same directory, then rename over the
    /// original.
    fn write_atomic(&self, content: &str) -> Result<(), StateError> {
        let tmp = match self.path.file_name() {
            Some(name) => {
                let mut tmp_name = name.to_os_string();
                tmp_name.push(".tmp");
                self.path.with_file_name(tmp_name)
            }
            None => self.path.with_extension("tmp"),
        };

        fs::write(&tmp, content).map_err(|e| StateError::Write {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| StateError::Write {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Byte range of an assignment's value within the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

/// Find the value span of the unique top-level assignment to `name`.
///
/// An assignment is a line whose column 0 starts the target name,
/// followed by optional spaces, `=`, and the value. The value must begin
/// on the same line; objects and arrays may continue across lines.
fn locate_assignment(source: &str, name: &str) -> Result<Span, StateError> {
    let mut found: Option<Span> = None;
    let mut offset = 0;

    for line in source.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let rest = match line.strip_prefix(name) {
            Some(rest) => rest,
            None => continue,
        };
        let after_ws = rest.trim_start_matches([' ', '\t']);
        let after_eq = match after_ws.strip_prefix('=') {
            Some(rest) => rest,
            None => continue,
        };

        if found.is_some() {
            return Err(StateError::DuplicateAssignment(name.to_string()));
        }

        let value = after_eq.trim_start_matches([' ', '\t']);
        let start = line_start + (line.len() - value.len());
        let end = scan_value(source, start)
            .ok_or_else(|| StateError::UnterminatedValue(name.to_string()))?;
        found = Some(Span { start, end });
    }

    found.ok_or_else(|| StateError::MissingAssignment(name.to_string()))
}

/// Scan one JSON value starting at `start`, returning the offset one past
/// its end.
///
/// Objects and arrays are matched by delimiter balance (string- and
/// escape-aware, so quotes and brackets inside string content do not
/// count); strings scan to their closing quote; any other value runs to
/// the end of the line.
fn scan_value(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    match *bytes.get(start)? {
        open @ (b'{' | b'[') => {
            let close = if open == b'{' { b'}' } else { b']' };
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escaped = false;
            for (i, &b) in bytes[start..].iter().enumerate() {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        in_string = false;
                    }
                } else if b == b'"' {
                    in_string = true;
                } else if b == open {
                    depth += 1;
                } else if b == close {
                    depth -= 1;
                    if depth == 0 {
                        return Some(start + i + 1);
                    }
                }
            }
            None
        }
        b'"' => {
            let mut escaped = false;
            for (i, &b) in bytes[start + 1..].iter().enumerate() {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    return Some(start + i + 2);
                }
            }
            None
        }
        _ => {
            let line_end = source[start..]
                .find('\n')
                .map(|i| start + i)
                .unwrap_or(source.len());
            let value = source[start..line_end].trim_end();
            if value.is_empty() {
                None
            } else {
                Some(start + value.len())
            }
        }
    }
}
