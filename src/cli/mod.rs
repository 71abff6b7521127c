//! Command-line interface for revfs.

pub mod args;
mod commands;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::config::{read_config, ConfigError};
use crate::remote::{HttpRemote, RemoteError, RemoteSource};
use crate::workspace::{Workspace, WorkspaceContext, WorkspaceError};

pub use args::GlobalArgs;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Workspace error.
    #[error("{0}")]
    Workspace(#[from] WorkspaceError),

    /// Remote error.
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// revfs - browse remote revision-versioned repositories.
#[derive(Parser, Debug)]
#[command(name = "revfs", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a directory or file resource.
    Ls(commands::ls::LsArgs),

    /// Print a file resource's content.
    Cat(commands::cat::CatArgs),

    /// Search file paths under a resource.
    Find(commands::find::FindArgs),

    /// Resolve a revision specifier to a commit id.
    Rev(commands::rev::RevArgs),

    /// Show the diff between two revisions.
    Diff(commands::diff::DiffArgs),
}

// =============================================================================
// Entry Point
// =============================================================================

/// Parse arguments and run the selected command.
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = read_config(&cli.global.to_config_source())?;
    let endpoint = cli
        .global
        .endpoint
        .clone()
        .unwrap_or_else(|| config.remote.endpoint.clone());
    let remote: Arc<dyn RemoteSource> = Arc::new(HttpRemote::new(&endpoint));

    match &cli.command {
        Command::Ls(args) => {
            let workspace = Workspace::open(WorkspaceContext { config, remote }).await?;
            commands::ls::run(&workspace, args, cli.global.json).await
        }
        Command::Cat(args) => {
            let workspace = Workspace::open(WorkspaceContext { config, remote }).await?;
            commands::cat::run(&workspace, args).await
        }
        Command::Find(args) => {
            let workspace = Workspace::open(WorkspaceContext { config, remote }).await?;
            commands::find::run(&workspace, args, cli.global.json).await
        }
        Command::Rev(args) => commands::rev::run(remote.as_ref(), args, cli.global.json).await,
        Command::Diff(args) => commands::diff::run(remote.as_ref(), args, cli.global.json).await,
    }
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("REVFS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
