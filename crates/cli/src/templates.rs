//! Template content for the `anyunit init` scaffold.

/// Entry module: delegates everything to the base by default. Operators
/// replace this file through the `src-overwrite` config key; clearing
/// the override restores this pristine version on the next start.
pub const UNIT_LUA: &str = r#"-- Unit entry point. Overwrite via config to inject behavior.
local base = require("unit_base")

local M = setmetatable({}, { __index = base })

return M
"#;

/// Default handlers available on every unit, kept separate so overrides
/// can extend the base with `require("unit_base")` instead of replacing
/// everything.
pub const UNIT_BASE_LUA: &str = r#"-- Default unit behavior.
local M = {}

function M.on_start()
end

function M.ping()
    return "pong"
end

function M.echo(x)
    return x
end

return M
"#;

/// Seeded state document: empty snapshot, nothing installed.
pub const STATE: &str =
    "# anyunit unit state. Managed by the bootstrap process; do not edit.\n\
     original = {}\n\
     installed = \"\"\n";

/// Seeded rockhouse manifest: no offline packages bundled.
pub const ROCKHOUSE_MANIFEST: &str =
    "# Packages installable from the rockhouse directory, one name==version per line.\n";
