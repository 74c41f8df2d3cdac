use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use anyunit_core::{bootstrap, LuaRocksInstaller, UnitConfig, UnitPaths};
use anyunit_lua::{Extension, Runtime};

mod templates;

// Helper to convert ExtensionError to anyhow::Error (works around mlua not
// being Send+Sync)
fn map_ext_err<T>(result: anyunit_lua::Result<T>) -> Result<T> {
    result.map_err(|e| anyhow::anyhow!("{}", e))
}

/// anyunit - re-programmable unit harness
#[derive(Parser)]
#[command(name = "anyunit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Unit directory (defaults to $ANYUNIT_DIR, then the current directory)
    #[arg(long, global = true)]
    unit_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a deployable unit directory
    Init {
        /// Directory to scaffold (default: the unit directory)
        dir: Option<PathBuf>,
    },

    /// Bootstrap the unit and hand off to the extension
    Start {
        /// Path to the unit configuration JSON (default: <unit>/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Bootstrap the unit and dispatch one extension method
    Call {
        /// Method name looked up in the extension registry
        method: String,

        /// Arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,

        /// Path to the unit configuration JSON (default: <unit>/config.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let unit_dir = cli
        .unit_dir
        .or_else(|| std::env::var_os("ANYUNIT_DIR").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Init { dir } => cmd_init(&dir.unwrap_or(unit_dir)),
        Commands::Start { config } => cmd_start(&unit_dir, config.as_deref()),
        Commands::Call {
            method,
            args,
            config,
        } => cmd_call(&unit_dir, &method, &args, config.as_deref()),
    }
}

fn cmd_init(dir: &Path) -> Result<()> {
    let paths = UnitPaths::new(dir);
    if paths.state_file.exists() {
        bail!("unit already initialized at {}", dir.display());
    }

    fs::create_dir_all(&paths.src_dir)
        .with_context(|| format!("creating {}", paths.src_dir.display()))?;
    fs::create_dir_all(&paths.deps_dir)?;
    fs::create_dir_all(&paths.rockhouse_dir)?;

    fs::write(paths.src_dir.join("unit.lua"), templates::UNIT_LUA)?;
    fs::write(paths.src_dir.join("unit_base.lua"), templates::UNIT_BASE_LUA)?;
    fs::write(&paths.state_file, templates::STATE)?;
    fs::write(&paths.rockhouse_manifest, templates::ROCKHOUSE_MANIFEST)?;

    println!("initialized unit at {}", dir.display());
    Ok(())
}

fn cmd_start(unit_dir: &Path, config: Option<&Path>) -> Result<()> {
    let extension = boot(unit_dir, config)?;
    info!(unit = %unit_dir.display(), "handing off to extension");
    map_ext_err(extension.handle_event("start"))?;
    Ok(())
}

fn cmd_call(unit_dir: &Path, method: &str, args: &str, config: Option<&Path>) -> Result<()> {
    let extension = boot(unit_dir, config)?;
    let result = map_ext_err(extension.call(method, args))?;
    println!("{}", result);
    Ok(())
}

/// Run the bootstrap phases, then load the extension object.
fn boot(unit_dir: &Path, config: Option<&Path>) -> Result<Extension> {
    let paths = UnitPaths::new(unit_dir);
    let config_path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.unit_dir.join("config.json"));
    let config = UnitConfig::load(&config_path)?;

    let mut installer = LuaRocksInstaller::default();
    bootstrap(&paths, &config, &mut installer)?;

    let runtime = map_ext_err(Runtime::new(&paths.src_dir, &paths.deps_dir))?;
    map_ext_err(runtime.load_extension())
}
