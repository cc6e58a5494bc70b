//! nskv CLI
//!
//! Point operations against an on-disk namespaced key-value store, for
//! inspection and debugging.
//!
//! # Commands
//!
//! - `put` - Write a record
//! - `put-if-absent` - Write a record only if its key is new
//! - `get` - Print a record's value
//! - `delete` - Remove a record
//! - `batch` - Commit several puts as one batch

mod commands;

use clap::{Parser, Subcommand};
use nskv_storage::{new_on_disk_store, Engine, StoreConfig};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// nskv command-line store tools.
#[derive(Parser)]
#[command(name = "nskv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the storage directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Storage engine (redb or sled)
    #[arg(global = true, short, long, default_value = "redb")]
    engine: Engine,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a record, overwriting any previous value
    Put {
        /// Namespace to write into
        namespace: String,
        /// Record key
        key: String,
        /// Record value
        value: String,
    },

    /// Write a record only if the key does not exist yet
    PutIfAbsent {
        /// Namespace to write into
        namespace: String,
        /// Record key
        key: String,
        /// Record value
        value: String,
    },

    /// Print a record's value
    Get {
        /// Namespace to read from
        namespace: String,
        /// Record key
        key: String,
        /// Print the value as hex
        #[arg(long)]
        hex: bool,
    },

    /// Remove a record
    Delete {
        /// Namespace to delete from
        namespace: String,
        /// Record key
        key: String,
    },

    /// Commit several puts as one batch
    Batch {
        /// Namespace to write into
        namespace: String,
        /// Records as key=value
        #[arg(required = true)]
        pairs: Vec<String>,
    },
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let path = cli.path.ok_or("Storage path required")?;
    let store = new_on_disk_store(StoreConfig::new(path).engine(cli.engine));
    let mut out = io::stdout().lock();

    commands::with_store(store.as_ref(), |store| match &cli.command {
        Commands::Put {
            namespace,
            key,
            value,
        } => commands::put(store, namespace, key, value),
        Commands::PutIfAbsent {
            namespace,
            key,
            value,
        } => commands::put_if_absent(store, namespace, key, value),
        Commands::Get {
            namespace,
            key,
            hex,
        } => commands::get(store, namespace, key, *hex, &mut out),
        Commands::Delete { namespace, key } => commands::delete(store, namespace, key),
        Commands::Batch { namespace, pairs } => commands::batch(store, namespace, pairs, &mut out),
    })?;

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
