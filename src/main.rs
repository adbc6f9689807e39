//! # docingest CLI
//!
//! ```bash
//! docingest --config ./config/docingest.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docingest init` | Create the SQLite database and run schema migrations |
//! | `docingest ingest <file>` | Ingest a PDF from disk |
//! | `docingest get <id>` | Print a document and its chunks |
//! | `docingest list` | List recent documents |
//! | `docingest delete <id>` | Delete a document, its chunks and stored file |
//! | `docingest serve` | Start the HTTP upload server |
//!
//! Log verbosity follows `RUST_LOG` (default `docingest=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docingest::{config, get, ingest, migrate, server};

const DEFAULT_LOG_FILTER: &str = "docingest=info,docingest_core=info,tower_http=info";

/// PDF ingestion and chunking pipeline.
#[derive(Parser)]
#[command(name = "docingest", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docingest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents and chunks
    /// tables. Safe to run repeatedly.
    Init,

    /// Ingest a PDF file.
    Ingest {
        /// Path to the PDF.
        file: PathBuf,

        /// Document title (defaults to the file name without extension).
        #[arg(long)]
        title: Option<String>,

        /// Declared media type (defaults to one guessed from the extension).
        #[arg(long)]
        mime: Option<String>,

        /// Owning user identifier.
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Retrieve a document by its UUID.
    Get {
        /// Document UUID.
        id: String,
    },

    /// List documents, newest first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Delete a document with its chunks and stored file.
    Delete {
        /// Document UUID.
        id: String,
    },

    /// Start the HTTP upload server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Ingest {
            file,
            title,
            mime,
            user_id,
        } => {
            ingest::run_ingest(&cfg, &file, title, mime, user_id).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::List { limit } => {
            get::run_list(&cfg, limit).await?;
        }
        Commands::Delete { id } => {
            get::run_delete(&cfg, &id).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
