//! # RAG Relay CLI (`ragr`)
//!
//! The `ragr` binary is the primary interface for RAG Relay. It starts the
//! HTTP API or the MCP stdio proxy, and offers local retrieval and
//! question-answering commands for quick checks.
//!
//! ## Usage
//!
//! ```bash
//! ragr --config ./ragr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragr serve api` | Start the authenticated RAG HTTP API |
//! | `ragr serve mcp` | Start the MCP stdio proxy |
//! | `ragr search "<query>"` | Retrieve matching snippets, no generation |
//! | `ragr ask "<query>"` | Retrieve and generate an answer |
//!
//! ## Examples
//!
//! ```bash
//! # Start the HTTP API on [server].bind
//! ragr serve api --config ./ragr.toml
//!
//! # Start the MCP proxy for Cursor/Claude integration
//! RAG_API_TOKEN=secret ragr serve mcp
//!
//! # Which snippets match?
//! ragr search "bearer token"
//!
//! # Full pipeline with extra caller context
//! GEMINI_API_KEY=... ragr ask "how is auth done?" --context "auth lives in auth.rs"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rag_relay::config;
use rag_relay::mcp;
use rag_relay::pipeline::RagPipeline;
use rag_relay::server;

/// RAG Relay CLI — an authenticated retrieval and generation service with
/// an MCP tool proxy.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "ragr",
    about = "RAG Relay — an authenticated retrieval and generation service with an MCP tool proxy",
    version,
    long_about = "RAG Relay keeps an in-memory snippet store, matches queries against it by \
    keyword overlap, and generates answers through the Gemini API with a second-model fallback. \
    It serves a bearer-token HTTP API and an MCP stdio proxy for AI tool integration."
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Defaults to `./ragr.toml`. Server, auth, store, retrieval,
    /// generation, and proxy settings are read from this file.
    #[arg(long, global = true, default_value = "./ragr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start a server.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Retrieve matching snippets without generation.
    ///
    /// Scores every stored snippet against the query and prints the top
    /// matches in rank order.
    Search {
        /// Query words to match against the store.
        query: String,
    },

    /// Retrieve context and generate an answer.
    ///
    /// Runs the full pipeline locally: retrieval, prompt assembly, and
    /// generation (requires GEMINI_API_KEY or GOOGLE_API_KEY unless the
    /// provider is disabled).
    Ask {
        /// The question to answer.
        query: String,

        /// Extra context to place ahead of the retrieved snippets.
        #[arg(long)]
        context: Option<String>,
    },
}

/// Server subcommands.
#[derive(Subcommand)]
enum ServeService {
    /// Start the authenticated RAG HTTP API.
    ///
    /// Listens on `[server].bind` and serves /health, /rag, /retrieve,
    /// /summarize, and /ingest.
    Api,

    /// Start the MCP stdio proxy.
    ///
    /// Speaks the model-context protocol on stdin/stdout and forwards
    /// rag_docs tool calls to the configured remote endpoint.
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve { service } => match service {
            ServeService::Api => {
                server::run_server(&cfg).await?;
            }
            ServeService::Mcp => {
                mcp::run_proxy(&cfg).await?;
            }
        },
        Commands::Search { query } => {
            let pipeline = RagPipeline::new(&cfg)?;
            let credential = format!("Bearer {}", cfg.auth.resolve_token());
            let result = pipeline.retrieve_only(Some(&credential), &query)?;

            for (i, snippet) in result.results.iter().enumerate() {
                println!("{}. {}", i + 1, snippet);
            }
        }
        Commands::Ask { query, context } => {
            let pipeline = RagPipeline::new(&cfg)?;
            let credential = format!("Bearer {}", cfg.auth.resolve_token());
            let result = pipeline
                .answer(Some(&credential), &query, context.as_deref())
                .await?;

            println!("{}", result.answer);
            println!();
            println!("Sources:");
            for (i, source) in result.sources.iter().enumerate() {
                println!("  {}. {}", i + 1, source);
            }
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so the MCP stdio transport keeps stdout to
/// itself. `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
