//! Embedded Lua runtime hosting the unit extension.

use std::path::Path;

use mlua::{Function, Lua, Table, Value};
use tracing::{debug, info};

use crate::error::{ExtensionError, Result};
use crate::extension::Extension;

/// Name of the extension entry module inside the live source tree.
pub const ENTRY_MODULE: &str = "unit";

/// The Lua environment the extension executes in.
pub struct Runtime {
    lua: Lua,
}

impl Runtime {
    /// Create a runtime whose module search path covers the live source
    /// directory and the dependency directory, so overrides can import
    /// both reconciled modules and freshly provisioned packages.
    pub fn new(src_dir: &Path, deps_dir: &Path) -> Result<Self> {
        let lua = Lua::new();
        setup_package_path(&lua, src_dir, deps_dir)?;
        Ok(Self { lua })
    }

    /// Import the entry module and hand back the extension object.
    pub fn load_extension(&self) -> Result<Extension> {
        self.load_module(ENTRY_MODULE)
    }

    /// Import an arbitrary module as an extension. The module must
    /// return a table; anything else is an invalid entry point.
    pub fn load_module(&self, name: &str) -> Result<Extension> {
        debug!(module = name, "loading extension entry module");
        let require: Function = self.lua.globals().get("require")?;
        let value: Value = require.call(name)?;
        let table = match value {
            Value::Table(table) => table,
            _ => return Err(ExtensionError::InvalidEntryPoint(name.to_string())),
        };
        info!(module = name, "extension loaded");
        Ok(Extension::new(self.lua.clone(), table))
    }

    /// Access to the raw Lua state (for advanced use cases).
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

/// Prepend the unit's directories to `package.path`.
///
/// The dependency directory is listed both flat and in the luarocks tree
/// layout it is populated with; compiled modules resolve through
/// `package.cpath`.
fn setup_package_path(lua: &Lua, src_dir: &Path, deps_dir: &Path) -> mlua::Result<()> {
    let package: Table = lua.globals().get("package")?;
    let src = src_dir.display();
    let deps = deps_dir.display();

    let current_path: String = package.get("path")?;
    let new_path = format!(
        "{src}/?.lua;{src}/?/init.lua;\
         {deps}/?.lua;{deps}/?/init.lua;\
         {deps}/share/lua/5.4/?.lua;{deps}/share/lua/5.4/?/init.lua;\
         {current_path}"
    );
    package.set("path", new_path)?;

    let current_cpath: String = package.get("cpath")?;
    let new_cpath = format!("{deps}/lib/lua/5.4/?.so;{current_cpath}");
    package.set("cpath", new_cpath)?;

    debug!(src = %src_dir.display(), deps = %deps_dir.display(), "module search path configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn unit_dirs() -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
        let temp = TempDir::new().unwrap();
        let src_dir = temp.path().join("src");
        let deps_dir = temp.path().join("deps");
        fs::create_dir_all(&src_dir).unwrap();
        fs::create_dir_all(&deps_dir).unwrap();
        (temp, src_dir, deps_dir)
    }

    #[test]
    fn load_entry_module() {
        let (_temp, src_dir, deps_dir) = unit_dirs();
        fs::write(
            src_dir.join("unit.lua"),
            "local M = {}\nfunction M.ping() return \"pong\" end\nreturn M\n",
        )
        .unwrap();

        let runtime = Runtime::new(&src_dir, &deps_dir).unwrap();
        let extension = runtime.load_extension().unwrap();
        assert!(extension.has_method("ping"));
    }

    #[test]
    fn entry_module_must_return_a_table() {
        let (_temp, src_dir, deps_dir) = unit_dirs();
        fs::write(src_dir.join("unit.lua"), "return 42\n").unwrap();

        let runtime = Runtime::new(&src_dir, &deps_dir).unwrap();
        assert!(matches!(
            runtime.load_extension(),
            Err(ExtensionError::InvalidEntryPoint(_))
        ));
    }

    #[test]
    fn broken_entry_module_propagates_the_real_error() {
        let (_temp, src_dir, deps_dir) = unit_dirs();
        fs::write(src_dir.join("unit.lua"), "this is not lua (\n").unwrap();

        let runtime = Runtime::new(&src_dir, &deps_dir).unwrap();
        assert!(matches!(
            runtime.load_extension(),
            Err(ExtensionError::Lua(_))
        ));
    }

    #[test]
    fn missing_entry_module_fails() {
        let (_temp, src_dir, deps_dir) = unit_dirs();
        let runtime = Runtime::new(&src_dir, &deps_dir).unwrap();
        assert!(runtime.load_extension().is_err());
    }

    #[test]
    fn entry_can_import_from_source_and_deps() {
        let (_temp, src_dir, deps_dir) = unit_dirs();
        fs::write(src_dir.join("helper.lua"), "return { n = 1 }\n").unwrap();
        fs::write(deps_dir.join("provisioned.lua"), "return { n = 2 }\n").unwrap();
        fs::write(
            src_dir.join("unit.lua"),
            "local h = require(\"helper\")\n\
             local p = require(\"provisioned\")\n\
             local M = {}\n\
             function M.sum() return h.n + p.n end\n\
             return M\n",
        )
        .unwrap();

        let runtime = Runtime::new(&src_dir, &deps_dir).unwrap();
        let extension = runtime.load_extension().unwrap();
        let result = extension.call("sum", "[]").unwrap();
        assert_eq!(result, serde_json::json!(3));
    }

    #[test]
    fn luarocks_tree_layout_is_searched() {
        let (_temp, src_dir, deps_dir) = unit_dirs();
        let tree = deps_dir.join("share/lua/5.4");
        fs::create_dir_all(&tree).unwrap();
        fs::write(tree.join("rockmod.lua"), "return { ok = true }\n").unwrap();
        fs::write(
            src_dir.join("unit.lua"),
            "local r = require(\"rockmod\")\nlocal M = {}\nfunction M.ok() return r.ok end\nreturn M\n",
        )
        .unwrap();

        let runtime = Runtime::new(&src_dir, &deps_dir).unwrap();
        let extension = runtime.load_extension().unwrap();
        assert_eq!(extension.call("ok", "[]").unwrap(), serde_json::json!(true));
    }
}
