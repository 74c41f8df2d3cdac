//! The dynamically assembled extension object and its method registry.

use mlua::{Function, Lua, LuaSerdeExt, MultiValue, Table, Value};
use serde_json::Value as Json;
use tracing::debug;

use crate::error::{ExtensionError, Result};

/// The caller-defined extension: the table returned by the entry module.
///
/// Function fields form the RPC registry; lifecycle events dispatch to
/// optional `on_<event>` handlers. Lookups go through the table's
/// metatable, so an entry module may delegate to a base table.
pub struct Extension {
    lua: Lua,
    table: Table,
}

impl Extension {
    pub(crate) fn new(lua: Lua, table: Table) -> Self {
        Self { lua, table }
    }

    /// Dispatch a method through the registry.
    ///
    /// `args` must be a JSON array (or blank); each element becomes one
    /// Lua argument. A field that is missing or not a function is an
    /// unknown method, not a silent nil call.
    pub fn call(&self, method: &str, args: &str) -> Result<Json> {
        let items: Vec<Json> = if args.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(args).map_err(ExtensionError::BadArguments)?
        };

        let func = self.lookup(method)?;
        let mut lua_args = Vec::with_capacity(items.len());
        for item in &items {
            lua_args.push(self.lua.to_value(item)?);
        }

        debug!(method, args = items.len(), "dispatching rpc method");
        let result: Value = func.call(MultiValue::from_iter(lua_args))?;
        let json: Json = self.lua.from_value(result)?;
        Ok(json)
    }

    /// Fire a lifecycle event, calling the extension's `on_<event>`
    /// handler. Returns `false` when no handler is defined; a unit with
    /// no opinion about an event is not an error.
    pub fn handle_event(&self, event: &str) -> Result<bool> {
        let handler = format!("on_{event}");
        match self.table.get::<Value>(handler.as_str())? {
            Value::Function(func) => {
                debug!(event, "dispatching lifecycle event");
                func.call::<()>(())?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Whether the registry holds a callable entry for `method`.
    pub fn has_method(&self, method: &str) -> bool {
        matches!(self.table.get::<Value>(method), Ok(Value::Function(_)))
    }

    fn lookup(&self, method: &str) -> Result<Function> {
        match self.table.get::<Value>(method)? {
            Value::Function(func) => Ok(func),
            _ => Err(ExtensionError::UnknownMethod(method.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn extension_from(source: &str) -> (TempDir, Extension) {
        let temp = TempDir::new().unwrap();
        let src_dir = temp.path().join("src");
        let deps_dir = temp.path().join("deps");
        fs::create_dir_all(&src_dir).unwrap();
        fs::write(src_dir.join("unit.lua"), source).unwrap();
        let runtime = Runtime::new(&src_dir, &deps_dir).unwrap();
        let extension = runtime.load_extension().unwrap();
        (temp, extension)
    }

    #[test]
    fn call_roundtrips_json_arguments() {
        let (_temp, ext) = extension_from(
            "local M = {}\nfunction M.echo(x) return x end\nreturn M\n",
        );

        let result = ext.call("echo", r#"[{"a": "b", "n": [1, 2, 3]}]"#).unwrap();
        assert_eq!(result, json!({"a": "b", "n": [1, 2, 3]}));
    }

    #[test]
    fn call_spreads_array_elements_as_arguments() {
        let (_temp, ext) = extension_from(
            "local M = {}\nfunction M.add(a, b) return a + b end\nreturn M\n",
        );

        let result = ext.call("add", "[19, 23]").unwrap();
        assert_eq!(result, json!(42));
    }

    #[test]
    fn call_with_blank_args_passes_nothing() {
        let (_temp, ext) = extension_from(
            "local M = {}\nfunction M.nargs(...) return select(\"#\", ...) end\nreturn M\n",
        );

        assert_eq!(ext.call("nargs", "").unwrap(), json!(0));
        assert_eq!(ext.call("nargs", "[]").unwrap(), json!(0));
    }

    #[test]
    fn unknown_method_is_reported() {
        let (_temp, ext) = extension_from("return {}\n");
        assert!(matches!(
            ext.call("nope", "[]"),
            Err(ExtensionError::UnknownMethod(_))
        ));
    }

    #[test]
    fn non_function_field_is_not_callable() {
        let (_temp, ext) = extension_from("return { data = 42 }\n");
        assert!(matches!(
            ext.call("data", "[]"),
            Err(ExtensionError::UnknownMethod(_))
        ));
    }

    #[test]
    fn non_array_arguments_are_rejected() {
        let (_temp, ext) = extension_from(
            "local M = {}\nfunction M.echo(x) return x end\nreturn M\n",
        );
        assert!(matches!(
            ext.call("echo", r#"{"a": 1}"#),
            Err(ExtensionError::BadArguments(_))
        ));
    }

    #[test]
    fn runtime_errors_in_methods_propagate() {
        let (_temp, ext) = extension_from(
            "local M = {}\nfunction M.boom() error(\"kaboom\") end\nreturn M\n",
        );
        let err = ext.call("boom", "[]").unwrap_err();
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn lifecycle_event_dispatches_to_handler() {
        let (_temp, ext) = extension_from(
            "local M = { started = false }\n\
             function M.on_start() M.started = true end\n\
             function M.started_p() return M.started end\n\
             return M\n",
        );

        assert!(ext.handle_event("start").unwrap());
        assert_eq!(ext.call("started_p", "[]").unwrap(), json!(true));
    }

    #[test]
    fn missing_lifecycle_handler_is_not_an_error() {
        let (_temp, ext) = extension_from("return {}\n");
        assert!(!ext.handle_event("start").unwrap());
    }

    #[test]
    fn methods_resolve_through_metatables() {
        let (_temp, ext) = extension_from(
            "local base = {}\n\
             function base.ping() return \"pong\" end\n\
             local M = setmetatable({}, { __index = base })\n\
             return M\n",
        );

        assert_eq!(ext.call("ping", "[]").unwrap(), json!("pong"));
    }
}
