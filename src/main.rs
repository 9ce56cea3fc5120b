//! # Agent Activity CLI (`activity`)
//!
//! ## Usage
//!
//! ```bash
//! activity --config ./config/activity.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `activity init` | Create the SQLite database and run schema migrations |
//! | `activity ingest <file>` | Append records from a JSON Lines file |
//! | `activity sessions` | Print one page of reconstructed sessions as JSON |
//! | `activity stats` | Print windowed statistics as JSON |
//! | `activity serve` | Start the HTTP API |
//!
//! Diagnostics go to stderr and are filtered with `RUST_LOG`
//! (default `info`). Command output goes to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use agent_activity::{config, ingest, migrate, server, sessions, stats};

/// Agent Activity CLI: session reconstruction and activity statistics
/// over an agent activity log.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/activity.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "activity",
    about = "Session reconstruction and activity statistics over an agent activity log",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/activity.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Append records from a JSON Lines file.
    ///
    /// Each non-blank line is one record. Malformed lines are reported and
    /// skipped; the rest are stored.
    Ingest {
        /// Path to the `.jsonl` file.
        file: PathBuf,
    },

    /// List reconstructed sessions, newest first.
    Sessions {
        /// 1-based page number.
        #[arg(long)]
        page: Option<i64>,

        /// Sessions per page.
        #[arg(long)]
        page_size: Option<i64>,
    },

    /// Show activity statistics for a trailing window plus the lifetime
    /// record count.
    Stats {
        /// Window length in hours. Defaults to `[query].stats_window_hours`.
        #[arg(long)]
        hours: Option<i64>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file } => {
            ingest::run_ingest(&cfg, &file).await?;
        }
        Commands::Sessions { page, page_size } => {
            sessions::run_sessions(&cfg, page, page_size).await?;
        }
        Commands::Stats { hours } => {
            stats::run_stats(&cfg, hours).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
