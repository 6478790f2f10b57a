//! # JeongirIt CLI (`jeongirit`)
//!
//! ## Usage
//!
//! ```bash
//! jeongirit --config ./config/jeongirit.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jeongirit serve` | Start the HTTP server |
//! | `jeongirit ask <file> <question>` | Answer a question about a local document |
//! | `jeongirit chunk <file>` | Show how a local document would be chunked |
//!
//! Logging is controlled with `RUST_LOG`
//! (default `jeongirit=info,jeongirit_core=info,tower_http=info`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jeongirit::config::{self, Config, DEFAULT_CONFIG_PATH};
use jeongirit::pipeline::{self, DocumentQa, Upload};
use jeongirit::server::{self, Providers};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// JeongirIt: chat, document QA and circuit calculators for
/// electrical-engineering study.
#[derive(Parser)]
#[command(name = "jeongirit", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Run document QA on a local file and print the answer and sources.
    Ask {
        /// PDF, text or Markdown file.
        file: PathBuf,
        /// Question; summary keywords (e.g. "요약", "summarize") switch to
        /// whole-document summary mode.
        question: String,
    },

    /// Extract and chunk a local file without calling any provider.
    Chunk {
        file: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "jeongirit=info,jeongirit_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload {
        bytes,
        file_name,
        content_type: None,
    })
}

async fn cmd_ask(cfg: Config, file: &Path, question: &str) -> Result<()> {
    let providers = Providers::openai(&cfg)?;
    let qa = DocumentQa::new(Arc::new(cfg), providers.embedder, providers.model)?;
    let answer = qa.answer(read_upload(file)?, question).await?;

    println!("{}", answer.package.answer_text);
    if !answer.package.citations.is_empty() {
        println!();
        println!("Sources:");
        for c in &answer.package.citations {
            match c.page {
                Some(page) => println!("  - {} (p. {})", c.source, page),
                None => println!("  - {}", c.source),
            }
        }
    }
    Ok(())
}

fn cmd_chunk(cfg: &Config, file: &Path) -> Result<()> {
    let params = cfg.chunking.params()?;
    let prepared = pipeline::prepare(&read_upload(file)?, &params)?;

    println!(
        "{} pages, {} chunks (chunk_size={}, overlap={})",
        prepared.page_count,
        prepared.chunks.len(),
        params.chunk_size(),
        params.overlap()
    );
    for chunk in &prepared.chunks {
        let page = chunk
            .page_number
            .map(|p| (p + 1).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{:<4} page {:<4} {:>5} chars",
            chunk.sequence_index,
            page,
            chunk.text.chars().count()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            cfg.log_summary();
            server::run_server(&cfg).await?;
        }
        Commands::Ask { file, question } => {
            cmd_ask(cfg, &file, &question).await?;
        }
        Commands::Chunk { file } => {
            cmd_chunk(&cfg, &file)?;
        }
    }

    Ok(())
}
