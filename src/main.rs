//! # Lexvox CLI (`lexvox`)
//!
//! The `lexvox` binary is the operational interface for the answering
//! service: database initialization, statute download, indexing, retrieval
//! checks, one-off pipeline runs, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! lexvox --config ./config/lexvox.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexvox init` | Create the SQLite database and run schema migrations |
//! | `lexvox fetch-law <name> <out>` | Download a statute's XML from e-Gov |
//! | `lexvox index <file>` | Chunk and index one source document |
//! | `lexvox sources` | List indexed sources |
//! | `lexvox search "<query>"` | Ranked excerpt search over the index |
//! | `lexvox ask "<question>"` | Run the answer pipeline from the terminal |
//! | `lexvox serve` | Start the HTTP server |

mod config;
mod context;
mod db;
mod egov;
mod error;
mod generation;
mod indexer;
mod migrate;
mod pipeline;
mod sanitize;
mod search;
mod server;
mod synthesis;
mod vague;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::Row;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::PipelineError;

/// Lexvox — a retrieval-assisted legal voice answering service.
#[derive(Parser)]
#[command(
    name = "lexvox",
    about = "Lexvox — a retrieval-assisted legal voice answering service",
    version,
    long_about = "Lexvox retrieves supporting excerpts from a local FTS5 index of statute \
    text, asks a hosted language model for a long-form and a spoken-style answer, enforces \
    the spoken answer's tone and length rules, and synthesizes audio via a hosted voice API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lexvox.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the FTS5 chunk table, and the
    /// source bookkeeping table. Idempotent.
    Init,

    /// Download a statute's XML from the e-Gov law API.
    ///
    /// Resolves the exact statute name to its LawId, downloads the law
    /// data, and writes it to the output file ready for `index`.
    FetchLaw {
        /// Exact statute name, e.g. 労働基準法.
        name: String,

        /// Output file, e.g. sources/rouki.xml.
        out: PathBuf,

        /// e-Gov law-list category (2 = acts).
        #[arg(long, default_value_t = 2)]
        category: u8,
    },

    /// Chunk and index one source document.
    ///
    /// Strips markup, normalizes whitespace, splits the text into
    /// overlapping windows, and replaces the source's chunk set in a single
    /// transaction.
    Index {
        /// Source file (statute XML or plain text).
        file: PathBuf,

        /// Identifier stored with each chunk. Defaults to the file path.
        #[arg(long)]
        source_id: Option<String>,
    },

    /// List indexed sources with chunk counts.
    Sources,

    /// Search the index and print ranked excerpts.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Run the answer pipeline for one question.
    ///
    /// Requires OPENAI_API_KEY (and the ElevenLabs key when --audio is
    /// given).
    Ask {
        /// The question to answer.
        question: String,

        /// Also print the sanitized spoken script.
        #[arg(long)]
        voice: bool,

        /// Synthesize audio and write it to this file.
        #[arg(long)]
        audio: Option<PathBuf>,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::FetchLaw {
            name,
            out,
            category,
        } => {
            let client = reqwest::Client::new();
            let law_id = egov::lookup_law_id(&client, &name, category).await?;
            let xml = egov::fetch_law_xml(&client, &law_id).await?;

            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&out, &xml)
                .with_context(|| format!("Failed to write {}", out.display()))?;

            println!("Saved: {}", out.display());
            println!("lawId: {}", law_id);
            println!("bytes: {}", xml.len());
        }
        Commands::Index { file, source_id } => {
            let source_id =
                source_id.unwrap_or_else(|| file.to_string_lossy().into_owned());
            let raw = std::fs::read_to_string(&file).map_err(|e| {
                PipelineError::Index(format!("cannot read {}: {}", file.display(), e))
            })?;

            let pool = db::connect(&cfg).await?;
            let count = indexer::reindex(&pool, &source_id, &raw, &cfg.indexing).await?;
            pool.close().await;

            println!("DB: {}", cfg.db.path.display());
            println!("Indexed chunks: {}", count);
        }
        Commands::Sources => {
            let pool = db::connect(&cfg).await?;
            let rows = sqlx::query(
                "SELECT source_id, chunk_count, indexed_at FROM sources ORDER BY source_id",
            )
            .fetch_all(&pool)
            .await?;

            if rows.is_empty() {
                println!("No sources indexed.");
            } else {
                println!("{:<40} {:>8} INDEXED", "SOURCE", "CHUNKS");
                for row in &rows {
                    let source_id: String = row.get("source_id");
                    let chunk_count: i64 = row.get("chunk_count");
                    let indexed_at: i64 = row.get("indexed_at");
                    let date = chrono::DateTime::from_timestamp(indexed_at, 0)
                        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!("{:<40} {:>8} {}", source_id, chunk_count, date);
                }
            }
            pool.close().await;
        }
        Commands::Search { query, limit } => {
            let limit = limit.unwrap_or(cfg.retrieval.limit);
            let results = search::search_chunks(&cfg, &query, limit).await?;

            if results.is_empty() {
                println!("No results.");
            } else {
                for (i, result) in results.iter().enumerate() {
                    println!("{}. [{:.2}] {}", i + 1, result.score, result.source_id);
                    println!("   excerpt: {}", result.snippet);
                }
            }
        }
        Commands::Ask {
            question,
            voice,
            audio,
        } => {
            let cfg = Arc::new(cfg);
            let pipeline = pipeline::AnswerPipeline::new(Arc::clone(&cfg))?;

            if let Some(out) = audio {
                let answer = pipeline.answer(&question).await?;
                std::fs::write(&out, &answer.audio)
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                println!("voice: {}", answer.voice_text);
                println!("full:  {}", answer.full_text);
                println!("audio: {} ({} bytes)", out.display(), answer.audio.len());
            } else if voice {
                let (full_text, voice_text) = pipeline.voice_script(&question).await?;
                println!("voice: {}", voice_text);
                println!("full:  {}", full_text);
            } else {
                let text = pipeline.full_answer(&question).await?;
                println!("{}", text);
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
