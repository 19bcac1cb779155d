//! # Changefeed Indexer CLI (`cfi`)
//!
//! ## Usage
//!
//! ```bash
//! cfi --config ./config/cfi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cfi serve` | Start the changefeed HTTP sink |
//! | `cfi create-index <name>` | Create a search index (idempotent) |
//! | `cfi init` | Create the `docs` table in the source database |
//! | `cfi index <uri>...` | Fetch pages and insert them into `docs` |
//! | `cfi search <words>...` | Phrase search with highlights |

use changefeed_indexer::{config, indexer, migrate, provision, search, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Changefeed Indexer: projects a database changefeed onto a search index.
#[derive(Parser)]
#[command(
    name = "cfi",
    about = "Changefeed Indexer: projects a database changefeed onto a search index",
    version,
    long_about = "Receives changefeed batches over HTTP and applies every row change to an \
    Elasticsearch index idempotently, so redelivered or reordered batches converge. Also ships \
    the write path that feeds the changefeed: a page indexer with serialization-conflict retries."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cfi.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the changefeed HTTP sink.
    ///
    /// Binds to `[server].bind` and accepts `PUT /{date}/{file}` batches.
    Serve,

    /// Create a search index.
    ///
    /// Succeeds if the index already exists.
    CreateIndex {
        /// Index name (the changefeed's database name).
        name: String,
    },

    /// Create the `docs` table in the source database. Idempotent.
    Init,

    /// Fetch pages and insert their text into the `docs` table.
    ///
    /// Inserts retry on serialization conflicts; a URI that is already
    /// indexed fails.
    Index {
        /// One or more page URIs.
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Phrase search over indexed pages.
    Search {
        /// Words of the phrase.
        #[arg(required = true)]
        words: Vec<String>,

        /// Index to search instead of `[search].index`.
        #[arg(long)]
        index: Option<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "changefeed_indexer=info,cfi=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::CreateIndex { name } => {
            provision::run_create_index(&cfg, &name).await?;
        }
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { uris } => {
            indexer::run_index(&cfg, &uris).await?;
        }
        Commands::Search { words, index } => {
            search::run_search(&cfg, &words, index).await?;
        }
    }

    Ok(())
}
