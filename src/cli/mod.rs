//! Command-line interface for the figbind demo
//!
//! The root command and `serve` each own a config scope; both scopes are bound
//! onto the root so their flags are accepted anywhere on the command line.

use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use figbind::{ConfigHandle, ConfigRegistry};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod root;
mod serve;

use root::RootConfig;
use serve::ServeConfig;

/// Layered configuration for clap command trees
#[derive(Parser)]
#[command(name = "figbind")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo server command with its resolved config
    Serve,
}

pub fn run() -> Result<()> {
    let mut registry = ConfigRegistry::new();
    let root_config = ConfigHandle::<RootConfig>::new();
    let serve_config = ConfigHandle::<ServeConfig>::new();

    let command = Cli::command();
    let command = registry.bind(command, root::defaults(), &root_config, "")?;
    let command = registry.bind(command, serve::defaults(), &serve_config, "serve")?;

    let matches = command.get_matches();
    init_tracing(matches.get_flag("verbose"));

    registry.resolve_all(&matches).context("Failed to resolve configuration")?;
    if registry.run_config_tool(&matches).context("Failed to write configuration")? {
        return Ok(());
    }

    let cli = Cli::from_arg_matches(&matches)?;
    if cli.verbose {
        report_sources(&registry);
    }

    let root = root_config.get().context("Root config was not resolved")?;
    let serve = serve_config.get().context("Serve config was not resolved")?;
    match cli.command {
        None => root::run(root, serve),
        Some(Commands::Serve) => serve::run(root, serve),
    }
}

/// Print which layer supplied each resolved key.
fn report_sources(registry: &ConfigRegistry) {
    for scope in registry.scope_names() {
        let Some(store) = registry.store(scope) else {
            continue;
        };
        let label = if scope.is_empty() { "root" } else { scope };
        for key in store.keys() {
            let source = store.source_of(&key).unwrap_or_else(|| "unknown".to_string());
            eprintln!("{}: {} <- {}", label, key, source);
        }
    }
}

fn init_tracing(verbose: bool) {
    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
