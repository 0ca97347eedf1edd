//! DataStore Lite - command-line entry point.
//!
//! A thin wrapper over the library for poking at a store from a shell:
//!
//! ```text
//! dslite create DSL001 '{"name01":"Name001"}'
//! dslite create session '{"user":"Ariz"}' --ttl 30
//! dslite read DSL001
//! dslite delete DSL001
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use datastore_lite::{Config, DataStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dslite", version = datastore_lite::VERSION)]
#[command(about = "Embedded single-file JSON key-value store")]
struct Cli {
    /// Backing file (default: $DATASTORE_LITE_PATH or ~/DataStoreLite.txt)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// fsync after every write
    #[arg(long, global = true)]
    sync: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a JSON document under a key
    Create {
        key: String,
        /// The document, as JSON text
        value: String,
        /// Time-to-live in seconds (0 = never expires)
        #[arg(short, long, default_value_t = 0)]
        ttl: u64,
    },
    /// Print the document stored under a key
    Read { key: String },
    /// Delete the document stored under a key
    Delete { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env().with_sync_writes(cli.sync);
    if let Some(path) = cli.path {
        config = config.with_path(path);
    }

    let store = DataStore::open(config).context("failed to open data store")?;

    match cli.command {
        Command::Create { key, value, ttl } => {
            let document: serde_json::Value =
                serde_json::from_str(&value).context("value is not valid JSON")?;
            store.create_with_ttl(&key, &document, ttl)?;
            info!(key = %key, ttl = ttl, "Created");
        }
        Command::Read { key } => {
            let document = store.read(&key)?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Command::Delete { key } => {
            store.delete(&key)?;
            info!(key = %key, "Deleted");
        }
    }

    store.shutdown();
    Ok(())
}
