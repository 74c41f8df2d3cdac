//! Error types for anyunit-lua

use thiserror::Error;

/// Errors raised while loading or driving the extension object.
///
/// Load and eval failures are the caller's own override code going
/// wrong; they are propagated untouched so the operator sees the real
/// cause instead of a masked one.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Lua runtime error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("entry module '{0}' did not return a table")]
    InvalidEntryPoint(String),

    #[error("unknown method '{0}'")]
    UnknownMethod(String),

    #[error("method arguments must be a JSON array: {0}")]
    BadArguments(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExtensionError>;
