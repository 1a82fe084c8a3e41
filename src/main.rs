//! # threadkeep CLI (`tkeep`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tkeep init` | Create the SQLite database and both relations |
//! | `tkeep archive <sub> <id>` | Fetch a live thread, archive it, wait for completion |
//! | `tkeep latest` | Print the most recently archived threads |
//! | `tkeep serve` | Start the HTTP server |
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file. See `config/threadkeep.example.toml` for a full example.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use threadkeep::config::load_config;
use threadkeep::db;
use threadkeep::fetch::{HttpThreadFetcher, ThreadFetcher, ThreadRequest};
use threadkeep::ingest::Archiver;
use threadkeep::migrate;
use threadkeep::reconstruct;
use threadkeep::server::{self, AppState};

/// threadkeep — archives discussion threads into SQLite and serves ranked,
/// nested reconstructions.
#[derive(Parser)]
#[command(
    name = "tkeep",
    about = "threadkeep — archives discussion threads into SQLite and serves ranked reconstructions",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/threadkeep.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the threads and comments relations,
    /// and their indexes. Idempotent — running it multiple times is safe.
    Init,

    /// Fetch a live thread and archive it.
    ///
    /// Unlike the HTTP endpoint, this waits for the background ingestion to
    /// finish and reports its outcome.
    Archive {
        /// Community the thread belongs to.
        sub: String,
        /// External thread identifier.
        id: String,
    },

    /// Print the most recently archived threads.
    Latest {
        /// Maximum number of entries to print.
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threadkeep=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect_write(&config).await?;
            migrate::init_schema(&pool).await?;
            pool.close().await;
            println!("database initialized at {}", config.db.path.display());
        }

        Commands::Archive { sub, id } => {
            let write = db::connect_write(&config).await?;
            let read = db::connect_read(&config).await?;
            let fetcher: Arc<dyn ThreadFetcher> =
                Arc::new(HttpThreadFetcher::new(&config.source)?);
            let archiver = Archiver::new(
                write,
                read,
                Arc::clone(&fetcher),
                config.archive.max_depth,
            );

            let document = fetcher.fetch(&ThreadRequest::root(&sub, &id)).await?;
            let ticket = archiver.submit(&sub, document).await?;
            ticket.wait().await?;
            println!("archived r/{}/{}", sub, id);
        }

        Commands::Latest { limit } => {
            let read = db::connect_read(&config).await?;
            for link in reconstruct::latest_archives(&read, limit).await? {
                let date = chrono::DateTime::from_timestamp(link.archive_timestamp, 0)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| link.archive_timestamp.to_string());
                println!("{}  r/{}  {}  {}", date, link.sub, link.thread_id, link.title);
            }
        }

        Commands::Serve => {
            let write = db::connect_write(&config).await?;
            let read = db::connect_read(&config).await?;

            // Schema problems are fatal before the server accepts traffic.
            migrate::init_schema(&write).await?;

            let fetcher: Arc<dyn ThreadFetcher> =
                Arc::new(HttpThreadFetcher::new(&config.source)?);
            let archiver = Arc::new(Archiver::new(
                write,
                read.clone(),
                Arc::clone(&fetcher),
                config.archive.max_depth,
            ));

            let state = AppState {
                config: Arc::new(config.clone()),
                archiver,
                fetcher,
                read,
            };
            server::serve(&config, state).await?;
        }
    }

    Ok(())
}
