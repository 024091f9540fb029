//! HerdSync CLI
//!
//! Command-line tools for inspecting and repairing a HerdSync store.
//!
//! # Commands
//!
//! - `status` - Entity counts, queue length and conflicts
//! - `list` - Print the entities of one type
//! - `pending` - Print the change queue
//! - `conflicts` - Print unresolved conflicts
//! - `resolve` - Settle a conflict in favour of the local or remote version

mod commands;

use clap::{Parser, Subcommand};
use herdsync_core::{KeySource, StoreConfig, SyncContext};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// HerdSync store tools.
#[derive(Parser)]
#[command(name = "herdsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Password the store key is derived from (embedded key if omitted)
    #[arg(global = true, long)]
    password: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show entity counts, pending changes and conflicts
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List entities of one type
    List {
        /// Entity type (cow, milk_production, feed, vet_visit)
        entity_type: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show changes waiting for the backend
    Pending {
        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show unresolved conflicts
    Conflicts {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Resolve a conflict
    Resolve {
        /// Id of the conflicted entity
        id: String,

        /// Keep the local version and push it on the next sync
        #[arg(long, conflicts_with = "remote", required_unless_present = "remote")]
        local: bool,

        /// Adopt the backend version
        #[arg(long)]
        remote: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let password = cli.password;
    match cli.command {
        Commands::Status { format } => {
            let path = cli.path.ok_or("Store path required for status")?;
            let ctx = open(&path, password)?;
            commands::status::run(&ctx, &path, &format)?;
        }
        Commands::List {
            entity_type,
            format,
        } => {
            let path = cli.path.ok_or("Store path required for list")?;
            let ctx = open(&path, password)?;
            commands::list::run(&ctx, &entity_type, &format)?;
        }
        Commands::Pending { limit, format } => {
            let path = cli.path.ok_or("Store path required for pending")?;
            let ctx = open(&path, password)?;
            commands::pending::run(&ctx, limit, &format)?;
        }
        Commands::Conflicts { format } => {
            let path = cli.path.ok_or("Store path required for conflicts")?;
            let ctx = open(&path, password)?;
            commands::conflicts::run(&ctx, &format)?;
        }
        Commands::Resolve { id, local, remote } => {
            let path = cli.path.ok_or("Store path required for resolve")?;
            let ctx = open(&path, password)?;
            commands::resolve::run(&ctx, &id, local && !remote)?;
        }
        Commands::Version => {
            println!("HerdSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("HerdSync Core v{}", herdsync_core::VERSION);
            println!("Protocol v{}", herdsync_protocol::PROTOCOL_VERSION);
        }
    }

    Ok(())
}

fn open(path: &Path, password: Option<String>) -> Result<SyncContext, Box<dyn std::error::Error>> {
    let key = match password {
        Some(password) => KeySource::Password(password),
        None => KeySource::Embedded,
    };
    tracing::debug!(path = %path.display(), "opening store");
    let config = StoreConfig::new()
        .directory(path)
        .key(key)
        .create_if_missing(false);
    Ok(SyncContext::open_with(&config)?)
}
