//! # csv-rag CLI (`csvrag`)
//!
//! Ingest CSV files into a local vector store and query them.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csvrag init` | Create the SQLite database and schema |
//! | `csvrag ingest <csv> --namespace <ns>` | Upsert rows as documents |
//! | `csvrag query <ns> "<text>"` | Nearest documents to a query |
//! | `csvrag get <ns> <id>` | Print one stored document |
//! | `csvrag stats` | Namespaces and document counts |
//! | `csvrag completions <shell>` | Shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! csvrag init --config ./config/csvrag.toml
//! csvrag ingest products.csv --namespace products --id-col sku --meta-col price
//! csvrag query products "waterproof hiking boots" -k 5 --where '{"price": {"$lt": 150}}'
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use csv_rag::config::{self, DEFAULT_CONFIG_PATH};
use csv_rag::ingest::IngestArgs;
use csv_rag::progress::ProgressMode;
use csv_rag::{get, ingest, logging, migrate, search, stats};

/// csv-rag: semantic search over CSV rows.
///
/// All commands accept `--config` pointing to a TOML file. When the
/// default path does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "csvrag",
    about = "Ingest CSV rows into a local vector store and query them by meaning",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides `[logging].level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file and tables. Safe to run repeatedly.
    Init,

    /// Ingest a CSV file into a namespace.
    ///
    /// Each row becomes one document, or several when its text is longer
    /// than `--max-chars`. Ids are derived from `--id-col` values (or from
    /// the whole row), so re-running overwrites instead of duplicating.
    Ingest {
        /// Path to the CSV file (with a header row).
        csv: PathBuf,

        /// Target namespace.
        #[arg(long, short = 'n')]
        namespace: String,

        /// Column(s) that identify a row. Repeat for a composite key.
        #[arg(long = "id-col")]
        id_cols: Vec<String>,

        /// Prefix for generated ids (default from config: `dyn-`).
        #[arg(long)]
        id_prefix: Option<String>,

        /// Column(s) to embed as text. Defaults to all columns.
        #[arg(long = "text-col")]
        text_cols: Vec<String>,

        /// Column(s) to keep as metadata. Defaults to all columns.
        #[arg(long = "meta-col")]
        meta_cols: Vec<String>,

        /// Without `--text-col`, embed only text-typed columns.
        #[arg(long)]
        auto_text_only: bool,

        /// Documents per embed/write batch.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Maximum characters per chunk.
        #[arg(long)]
        max_chars: Option<usize>,

        /// Show row and document counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Query a namespace by semantic similarity.
    Query {
        /// Namespace to search.
        namespace: String,

        /// Free-text query.
        text: String,

        /// Number of results (default from `[retrieval].default_k`).
        #[arg(short = 'k', long)]
        k: Option<usize>,

        /// Metadata filter as JSON, e.g. `{"score": {"$gte": 4}}`.
        #[arg(long = "where")]
        where_json: Option<String>,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print one stored document.
    Get {
        namespace: String,
        id: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show namespaces and document counts.
    Stats,

    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "csvrag", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_or_default(&cli.config)?;
    logging::init(&cfg.logging, cli.log_level.as_deref())?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            csv,
            namespace,
            id_cols,
            id_prefix,
            text_cols,
            meta_cols,
            auto_text_only,
            batch_size,
            max_chars,
            dry_run,
            progress,
        } => {
            let args = IngestArgs {
                id_cols,
                id_prefix,
                text_cols,
                meta_cols,
                auto_text_only,
                batch_size,
                max_chars,
                dry_run,
                progress,
            };
            ingest::run_ingest(&cfg, &csv, &namespace, &args).await?;
        }
        Commands::Query {
            namespace,
            text,
            k,
            where_json,
            json,
        } => {
            search::run_query(&cfg, &namespace, &text, k, where_json.as_deref(), json).await?;
        }
        Commands::Get {
            namespace,
            id,
            json,
        } => {
            get::run_get(&cfg, &namespace, &id, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
