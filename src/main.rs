//! # Document QA CLI (`dqa`)
//!
//! The `dqa` binary is the primary interface for the document QA service.
//! It provides commands for database initialization, document ingestion,
//! question answering, maintenance, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! dqa --config ./config/dqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dqa init` | Create the SQLite database and run schema migrations |
//! | `dqa ingest <path>` | Ingest a local document |
//! | `dqa ingest --url <url>` | Download and ingest a remote document |
//! | `dqa ask "<question>"` | Answer a question over the ingested documents |
//! | `dqa search-term <term>` | Deterministic substring presence check |
//! | `dqa reset` | Delete the vector collection |
//! | `dqa serve api` | Start the HTTP API server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use docqa::ask::{AskRequest, Router};
use docqa::cache::AnswerCache;
use docqa::store::sqlite::SqliteStore;
use docqa::store::VectorStore;
use docqa::{config, db, embedding, ingest, llm, migrate, server};

/// Document QA CLI — ingest documents and ask questions over them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dqa",
    about = "Document QA — a retrieval-augmented document question-answering service",
    version,
    long_about = "Document QA ingests heterogeneous documents (PDF, Word, Excel, PowerPoint, \
    CSV, HTML, JSON, XML, Markdown, plain text), chunks and embeds them into a persistent \
    vector index, and answers natural-language questions over them with a language model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the collections/records tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Ingest a document into the vector store.
    ///
    /// Extracts text (with format-specific fallbacks), chunks it into
    /// overlapping windows, embeds the chunks, and stores them.
    Ingest {
        /// Path to a local document.
        path: Option<PathBuf>,

        /// Download and ingest a remote document instead of a local file.
        #[arg(long, conflicts_with = "path")]
        url: Option<String>,
    },

    /// Ask a question over the ingested documents.
    ///
    /// The question is classified (refinement / summary / grounded QA) and
    /// routed accordingly; the answer prints to stdout.
    Ask {
        /// The question text.
        question: String,

        /// Tenant id for answer caching and refinement chaining.
        #[arg(long)]
        tenant: Option<String>,

        /// Previous answer to refine (for "in N words" requests).
        #[arg(long)]
        prev_answer: Option<String>,
    },

    /// Deterministic substring search across stored records.
    ///
    /// Case-insensitive presence check, useful when semantic retrieval
    /// looks off.
    SearchTerm {
        /// The term to look for.
        term: String,
    },

    /// Delete the vector collection.
    ///
    /// The administrative remedy for an embedding dimension mismatch after
    /// switching embedding models.
    Reset,

    /// Start the HTTP API server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Start the JSON API server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Api,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path, url } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            let store = SqliteStore::new(pool);
            let embedder = embedding::create_embedder(&cfg.embedding)?;

            let summary = match (path, url) {
                (Some(path), None) => {
                    ingest::ingest_file(&store, embedder.as_ref(), &cfg, &path).await?
                }
                (None, Some(url)) => {
                    ingest::ingest_url(&store, embedder.as_ref(), &cfg, &url).await?
                }
                _ => anyhow::bail!("Provide a file path or --url"),
            };

            println!("ingest {}", summary.source);
            println!("  chunks written: {}", summary.chunks);
            println!("ok");
        }
        Commands::Ask {
            question,
            tenant,
            prev_answer,
        } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            let store: Arc<dyn VectorStore> = Arc::new(SqliteStore::new(pool));
            let embedder = embedding::create_embedder(&cfg.embedding)?;
            let completer = llm::create_completer(&cfg.llm)?;
            let cache = Arc::new(AnswerCache::new());
            let router = Router::new(store, embedder, completer, cache, Arc::new(cfg));

            let response = router
                .ask(AskRequest {
                    question,
                    tenant_id: tenant,
                    prev_answer,
                })
                .await?;

            println!("{}", response.answer);
            if let Some(note) = response.note {
                println!("({})", note);
            }
            if let Some(chunks) = response.chunks {
                if !chunks.is_empty() {
                    println!();
                    println!("-- {} supporting chunks retrieved", chunks.len());
                }
            }
        }
        Commands::SearchTerm { term } => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            let store = SqliteStore::new(pool);

            let records = store
                .full_scan(&cfg.retrieval.collection, cfg.retrieval.scan_limit)
                .await?;

            let term_lower = term.to_ascii_lowercase();
            let mut matched = 0usize;
            for record in &records {
                if let Some(pos) = record.text.to_ascii_lowercase().find(&term_lower) {
                    matched += 1;
                    println!(
                        "{}. {} (chunk {})",
                        matched, record.metadata.source, record.metadata.chunk_index
                    );
                    println!(
                        "    \"{}\"",
                        docqa::ask::snippet_around(&record.text, pos, 80).replace('\n', " ")
                    );
                }
            }

            if matched == 0 {
                println!("No matches.");
            } else {
                println!();
                println!("{} matches in {} records", matched, records.len());
            }
        }
        Commands::Reset => {
            let pool = db::connect(&cfg).await?;
            migrate::apply_schema(&pool).await?;
            let store = SqliteStore::new(pool);
            store.delete_collection(&cfg.retrieval.collection).await?;
            println!("Collection '{}' deleted.", cfg.retrieval.collection);
        }
        Commands::Serve { service } => match service {
            ServeService::Api => {
                server::run_server(&cfg).await?;
            }
        },
    }

    Ok(())
}
