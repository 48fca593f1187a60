//! Guidekit - install and maintain framework documents in a workspace
//!
//! Main entry point: parses flags, sets up tracing and dispatches to the
//! framework commands.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use guidekit_core::{GuidekitConfig, LifecycleManager, LocalFileGateway};

mod frameworks_cli;
mod prompt;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "guidekit",
    about = "Install, update and track framework guidance documents",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: frameworks_cli::FrameworkCommand,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[clap(long, global = true)]
    log_json: bool,

    /// Workspace root
    #[clap(long, short = 'C', default_value = ".", global = true)]
    workspace: PathBuf,

    /// Override the configuration file path
    #[clap(long, global = true)]
    config: Option<PathBuf>,
}

/// Initialize tracing from CLI flags. `RUST_LOG` directives are layered on top.
fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());
    if let Ok(env) = std::env::var("RUST_LOG") {
        for directive in env.split(',').filter(|d| !d.is_empty()) {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
    }

    // Logs go to stderr so --json output on stdout stays parseable
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_manager(workspace: &std::path::Path, config: Option<&std::path::Path>) -> Result<LifecycleManager> {
    let root = workspace
        .canonicalize()
        .with_context(|| format!("Workspace not found: {}", workspace.display()))?;

    let config = GuidekitConfig::discover(&root, config).context("Failed to load configuration")?;
    let layout = config.resolve(&root);
    tracing::debug!(?layout, "Resolved workspace layout");

    Ok(LifecycleManager::new(layout, std::sync::Arc::new(LocalFileGateway::new())))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let manager = build_manager(&cli.workspace, cli.config.as_deref())?;
    cli.command.execute(&manager).await
}
