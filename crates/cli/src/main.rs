use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ledgerline_import::{CancellationToken, StatementSource};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{FilePatternStore, PatternSet, Settings};

#[derive(Parser, Debug)]
#[command(name = "ledgerline", version, about = "Bank statement ingestion and categorization")]
struct Cli {
    /// Settings file (TOML); built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse, convert and categorize a statement export, printing a JSON report
    Ingest {
        file: PathBuf,

        /// Rule book with [[rules]] and [[categories]] tables
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Directory holding learned pattern sets
        #[arg(long)]
        patterns: Option<PathBuf>,

        #[arg(long, default_value = "default")]
        owner: String,

        /// Field delimiter; sniffed when omitted
        #[arg(long)]
        delimiter: Option<char>,
    },

    /// Show which bank format a statement looks like, with every variant's score
    Detect {
        file: PathBuf,

        #[arg(long)]
        delimiter: Option<char>,
    },

    /// Record that a description belongs to a category
    Learn {
        #[arg(long)]
        patterns: PathBuf,

        #[arg(long, default_value = "default")]
        owner: String,

        #[arg(long)]
        description: String,

        #[arg(long)]
        category: String,
    },

    /// OCR page images region by region and ingest the result
    #[cfg(feature = "tesseract")]
    Regions {
        /// Region layout (JSON)
        #[arg(long)]
        layout: PathBuf,

        #[arg(long)]
        rules: Option<PathBuf>,

        #[arg(long)]
        patterns: Option<PathBuf>,

        #[arg(long, default_value = "default")]
        owner: String,

        /// Page images in page order
        #[arg(required = true)]
        pages: Vec<PathBuf>,
    },
}

fn pattern_set(dir: Option<PathBuf>, owner: String) -> Option<PatternSet> {
    dir.map(|dir| PatternSet { store: FilePatternStore::new(dir), owner })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serializing output")?);
    Ok(())
}

/// A token that flips on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            handle.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Ingest { file, rules, patterns, owner, delimiter } => {
            if delimiter.is_some() {
                settings.ingest.delimiter = delimiter;
                settings.ingest.validate()?;
            }
            let cancel = interrupt_token();
            let set = pattern_set(patterns, owner);
            let output = tokio::task::spawn_blocking(move || {
                let text = commands::read_statement(&file)?;
                let source = StatementSource::infer(&text, settings.ingest.delimiter_byte());
                commands::ingest(&settings.ingest, &source, rules.as_deref(), set.as_ref(), &cancel)
            })
            .await
            .context("ingest worker panicked")??;
            print_json(&output)?;
        }

        Command::Detect { file, delimiter } => {
            if delimiter.is_some() {
                settings.ingest.delimiter = delimiter;
                settings.ingest.validate()?;
            }
            let text = commands::read_statement(&file)?;
            print_json(&commands::detect(&settings.ingest, &text)?)?;
        }

        Command::Learn { patterns, owner, description, category } => {
            let set = PatternSet { store: FilePatternStore::new(patterns), owner };
            print_json(&commands::learn(&set, &description, &category)?)?;
        }

        #[cfg(feature = "tesseract")]
        Command::Regions { layout, rules, patterns, owner, pages } => {
            let cancel = interrupt_token();
            let set = pattern_set(patterns, owner);
            let output = commands::ingest_regions(
                &settings,
                &layout,
                &pages,
                rules.as_deref(),
                set.as_ref(),
                &cancel,
            )
            .await?;
            print_json(&output)?;
        }
    }
    Ok(())
}
