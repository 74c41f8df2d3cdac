//! anyunit-lua: the embedded extension runtime.
//!
//! Loads the reconciled source tree into a Lua interpreter and exposes
//! the entry module's table as the unit's extension object: RPC methods
//! by registry lookup, lifecycle events via optional `on_<event>`
//! handlers, arguments and results carried as JSON.

mod error;
mod extension;
mod runtime;

pub use error::{ExtensionError, Result};
pub use extension::Extension;
pub use runtime::{Runtime, ENTRY_MODULE};
