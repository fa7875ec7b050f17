//! # askdoc CLI
//!
//! The `askdoc` binary is the reference surface around the ingestion and
//! retrieval engine. It plays the roles a surrounding service would
//! otherwise fill: the `--owner` flag stands in for the auth provider, and
//! the ingest command is the file-intake layer (reads bytes, infers media
//! types, fingerprints content).
//!
//! ## Usage
//!
//! ```bash
//! askdoc --config ./config/askdoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askdoc init` | Create the SQLite database and run schema migrations |
//! | `askdoc ingest <files...>` | Ingest a batch of documents |
//! | `askdoc retrieve "<question>"` | Rank documents against a question |
//! | `askdoc get <id>` | Print a document's metadata, summary, and content |
//! | `askdoc list` | List an owner's documents |
//! | `askdoc delete <id>` | Delete a document |
//!
//! ## Examples
//!
//! ```bash
//! askdoc init
//! askdoc ingest --owner alice q3-report.pdf notes.md
//! askdoc retrieve --owner alice --doc <id> "How did revenue change?"
//! askdoc delete --owner alice <id>
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use askdoc::{config, get, ingest, migrate, retrieve};

/// askdoc — document ingestion and semantic retrieval for grounded Q&A.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/askdoc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "askdoc",
    about = "askdoc — document ingestion and semantic retrieval for grounded question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/askdoc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents table. Idempotent.
    Init,

    /// Ingest a batch of documents.
    ///
    /// Each file runs the full pipeline independently (extract → summarize
    /// → embed → store); one failed file never aborts the others. Media
    /// types are inferred from file extensions.
    Ingest {
        /// Files to ingest (.txt, .md, .pdf, .docx).
        files: Vec<PathBuf>,

        /// Owning principal for the ingested documents.
        #[arg(long)]
        owner: String,
    },

    /// Rank documents against a natural-language question.
    ///
    /// Embeds the question and returns the most similar documents above the
    /// similarity threshold, scoped to one document with `--doc` or to the
    /// owner's whole corpus without it.
    Retrieve {
        /// The question to ground.
        query: String,

        /// Restrict retrieval to a single document id.
        #[arg(long)]
        doc: Option<String>,

        /// Owning principal performing the query.
        #[arg(long)]
        owner: String,

        /// Maximum number of results (defaults to retrieval.top_k).
        #[arg(long)]
        k: Option<usize>,

        /// Minimum cosine similarity (defaults to retrieval.min_similarity).
        #[arg(long)]
        min_similarity: Option<f32>,
    },

    /// Print a document's metadata, summary, and full content.
    Get {
        /// Document id.
        id: String,

        /// Owning principal.
        #[arg(long)]
        owner: String,
    },

    /// List an owner's documents, newest first.
    List {
        /// Owning principal.
        #[arg(long)]
        owner: String,
    },

    /// Delete a document. Deleting an absent id is not an error.
    Delete {
        /// Document id.
        id: String,

        /// Owning principal.
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { files, owner } => {
            ingest::run_ingest(&cfg, &owner, &files).await?;
        }
        Commands::Retrieve {
            query,
            doc,
            owner,
            k,
            min_similarity,
        } => {
            retrieve::run_retrieve(&cfg, &query, doc.as_deref(), &owner, k, min_similarity).await?;
        }
        Commands::Get { id, owner } => {
            get::run_get(&cfg, &id, &owner).await?;
        }
        Commands::List { owner } => {
            get::run_list(&cfg, &owner).await?;
        }
        Commands::Delete { id, owner } => {
            get::run_delete(&cfg, &id, &owner).await?;
        }
    }

    Ok(())
}
