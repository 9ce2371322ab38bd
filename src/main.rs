//! # semdex CLI (`sdx`)
//!
//! The `sdx` binary drives the import and search pipeline. All commands
//! accept a `--config` flag pointing to a TOML configuration file.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sdx init` | Create the documents table and vector indexes |
//! | `sdx import <root>` | Import a directory tree of markdown files |
//! | `sdx import-file <path>` | Import a single file |
//! | `sdx delete <path>` | Delete a document by relative path |
//! | `sdx search "<query>"` | Ranked bilingual semantic search |
//! | `sdx get <path>` | Print a document's stored state |
//! | `sdx stats` | Row and embedding counts |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the schema
//! sdx init --config ./config/sdx.toml
//!
//! # Import the primary-language documentation tree
//! sdx import ./docs
//!
//! # Import a translated tree (relative paths must match the primary tree)
//! sdx import ./docs-cs --language cs
//!
//! # Import one file and attach an in-memory-translated embedding
//! sdx import-file ./docs/setup.md --root ./docs --translate
//!
//! # Search across both language variants
//! sdx search "database backup" --limit 5 --max-distance 0.5
//! ```

mod config;
mod db;
mod embedding;
mod error;
mod get;
mod import;
mod migrate;
mod models;
mod search;
mod stats;
mod translate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bilingual semantic search over markdown document trees.
#[derive(Parser)]
#[command(
    name = "sdx",
    about = "semdex — bilingual semantic search over markdown document trees",
    version,
    long_about = "semdex imports markdown files, embeds them through an external \
    model-serving API, stores primary- and translated-language vectors in PostgreSQL \
    with pgvector, and serves merged nearest-neighbor search across both variants."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sdx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the pgvector extension, the documents table sized to the
    /// configured embedding dimension, and HNSW cosine indexes on both
    /// vector columns. Idempotent.
    Init,

    /// Import a directory tree of markdown files.
    ///
    /// Unchanged files (by content hash) are skipped without an embedding
    /// call. Per-file failures are reported and do not abort the batch.
    Import {
        /// Root directory of the tree to import.
        root: PathBuf,

        /// Language tag: the configured primary language (default) or the
        /// translated language, meaning the tree holds translated renderings
        /// whose embeddings attach to existing primary documents.
        #[arg(long)]
        language: Option<String>,

        /// List matching files without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Import a single file.
    ImportFile {
        /// Path to the file.
        path: PathBuf,

        /// Language tag, as for `import`.
        #[arg(long)]
        language: Option<String>,

        /// Root the stored relative path is computed against; defaults to
        /// the bare file name.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Also translate the content in memory and attach the translated
        /// embedding. The translated text is discarded after embedding.
        #[arg(long)]
        translate: bool,
    },

    /// Delete a document by its relative path.
    Delete {
        /// Relative path as stored at import time.
        path: String,
    },

    /// Search indexed documents across both language variants.
    Search {
        /// The search query.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        limit: i64,

        /// Discard candidates whose cosine distance is not strictly below
        /// this cutoff.
        #[arg(long)]
        max_distance: Option<f64>,
    },

    /// Print a document's stored state by relative path.
    Get {
        /// Relative path as stored at import time.
        path: String,
    },

    /// Print row and embedding counts.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import {
            root,
            language,
            dry_run,
        } => {
            import::run_import(&cfg, &root, language.as_deref(), dry_run).await?;
        }
        Commands::ImportFile {
            path,
            language,
            root,
            translate,
        } => {
            import::run_import_file(&cfg, &path, language.as_deref(), root.as_deref(), translate)
                .await?;
        }
        Commands::Delete { path } => {
            import::run_delete(&cfg, &path).await?;
        }
        Commands::Search {
            query,
            limit,
            max_distance,
        } => {
            search::run_search(&cfg, &query, limit, max_distance).await?;
        }
        Commands::Get { path } => {
            get::run_get(&cfg, &path).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
