//! # TSA RAG CLI (`rag`)
//!
//! Index a corpus of TSA baggage rules and ask questions grounded in it.
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the SQLite database and run schema migrations |
//! | `rag index` | Embed and store the corpus (no-op if already populated) |
//! | `rag search "<query>"` | Show the closest rules to a query |
//! | `rag ask "<query>"` | Retrieve rules and stream a grounded answer |
//! | `rag stats` | Show item count and embedding profile |
//!
//! ## Examples
//!
//! ```bash
//! rag init
//! rag index --corpus ./data/tsa_rules.txt
//! rag search "can I bring a gun"
//! rag ask "Can I take my laptop in a carry-on?" --model gpt-4-0125-preview
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` or pass `-v`/`-vv` to see them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tsa_rag::{ask, chat, config, embedding, index_cmd, migrate, search, sqlite_store, stats};
use tsa_rag_core::collection::Collection;
use tsa_rag_core::error::RagError;

/// TSA RAG: answer TSA baggage questions from a rule corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rag.toml` for an example.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Retrieval-augmented assistant for TSA baggage rules",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Embed and store the rule corpus.
    ///
    /// Skipped when the store already holds items, unless `--force` is given.
    Index {
        /// Corpus file to index instead of `[corpus].path`.
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Re-upsert every line even if the store is populated.
        #[arg(long)]
        force: bool,
    },

    /// Show the rules closest to a query.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (default `[retrieval].search_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from the retrieved rules, streaming the response.
    Ask {
        /// The question.
        query: String,

        /// Number of rules to retrieve as context (default `[retrieval].k`).
        #[arg(long)]
        k: Option<usize>,

        #[arg(
            long,
            help = format!(
                "Chat model (default `[chat].model`), e.g. {} or {}",
                config::GPT35_TURBO,
                config::GPT4_TURBO
            )
        )]
        model: Option<String>,
    },

    /// Show item count and the recorded embedding profile.
    Stats,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = tsa_rag::db::connect(&cfg)
                .await
                .map_err(|e| RagError::store("could not open database", e))?;
            migrate::run_migrations(&pool)
                .await
                .map_err(|e| RagError::store("could not create schema", e))?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        command => {
            let store = sqlite_store::SqliteStore::open(&cfg)
                .await
                .map_err(|e| RagError::store("could not open database", e))?;
            let embedder = embedding::create_embedder(&cfg.embedding)?;
            let collection =
                Collection::open(&store, embedder.as_ref(), cfg.retrieval.metric).await?;
            tracing::info!(?collection, "collection opened");

            match command {
                Commands::Index { corpus, force } => {
                    index_cmd::run_index(&cfg, &collection, corpus.as_deref(), force).await?;
                }
                Commands::Search { query, limit } => {
                    let limit = limit.unwrap_or(cfg.retrieval.search_limit);
                    search::run_search(&collection, &query, limit).await?;
                }
                Commands::Ask { query, k, model } => {
                    let k = k.unwrap_or(cfg.retrieval.k);
                    let model = model.unwrap_or_else(|| cfg.chat.model.clone());
                    let provider = chat::create_chat_provider(&cfg.chat)?;
                    ask::run_ask(&collection, provider.as_ref(), &query, k, &model).await?;
                }
                Commands::Init | Commands::Stats => unreachable!("handled above"),
            }

            store.close().await;
        }
    }

    Ok(())
}
