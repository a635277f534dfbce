//! Summarize a CSV of support tickets into CSV/Markdown reports.
//!
//! Reads the API key from the `OPENAI_API_KEY` environment variable.
//! Settings resolve CLI > `SUMM_*` environment > defaults.
//!
//! # Examples
//!
//! ```sh
//! # Summarize tickets to both report formats
//! summarize tickets.csv --out report.csv --markdown report.md
//!
//! # Override the model and chunk budget
//! summarize tickets.csv --out report.csv --model gpt-4o --chunk-size 8000
//!
//! # Sliding-window packing with a 120-token overlap
//! summarize tickets.csv --markdown report.md --sliding-window --overlap 120
//! ```

use std::path::PathBuf;
use std::process;

use clap::Parser;
use summarize_rs::api::ModelClient;
use summarize_rs::settings::{CliOverrides, Settings};
use summarize_rs::tokens::{BpeTokenCounter, HeuristicTokenCounter, TokenCounter};
use summarize_rs::{loader, pipeline, writer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Summarize a CSV of support tickets with an LLM.
///
/// Reads the API key from the OPENAI_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "summarize")]
struct Cli {
    /// Path to the input CSV file of tickets
    csv_in: PathBuf,

    // ── Outputs ────────────────────────────────────────────────
    /// Write the report as CSV to this path
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the report as a Markdown table to this path
    #[arg(long)]
    markdown: Option<PathBuf>,

    // ── Settings overrides ─────────────────────────────────────
    /// Model to use for summarization and token counting
    #[arg(long)]
    model: Option<String>,

    /// Token budget per chunk (default: context window minus response margin)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Overlap budget in tokens (sliding-window packing)
    #[arg(long)]
    overlap: Option<usize>,

    /// Maximum tickets per chunk (count/token-bounded packing)
    #[arg(long)]
    max_records: Option<usize>,

    /// Field delimiter for the input CSV (use \t for tab)
    #[arg(long)]
    delimiter: Option<String>,

    /// Pack with the sliding-window overlap policy instead of the bounded one
    #[arg(long)]
    sliding_window: bool,

    /// Maximum concurrent model calls
    #[arg(long)]
    concurrency: Option<usize>,
}

async fn run(cli: &Cli) -> Result<(), String> {
    let delimiter = cli
        .delimiter
        .as_deref()
        .map(summarize_rs::settings::parse_delimiter)
        .transpose()
        .map_err(|e| format!("--delimiter: {e}"))?;

    let overrides = CliOverrides {
        model: cli.model.clone(),
        chunk_size: cli.chunk_size,
        overlap: cli.overlap,
        max_records: cli.max_records,
        delimiter,
        sliding_window: cli.sliding_window,
        concurrency: cli.concurrency,
    };
    let settings = Settings::resolve(&overrides)?;

    let tickets = loader::load_tickets(&cli.csv_in, settings.csv_delimiter)?;
    info!("loaded {} tickets from {}", tickets.len(), cli.csv_in.display());

    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| "OPENAI_API_KEY environment variable is not set".to_string())?;
    let client = ModelClient::new(api_key, &settings)?;

    let counter: Box<dyn TokenCounter> = match BpeTokenCounter::for_model(&settings.model) {
        Ok(counter) => Box::new(counter),
        Err(e) => {
            warn!("falling back to heuristic token counting: {e}");
            Box::new(HeuristicTokenCounter::default())
        }
    };

    let rows = pipeline::run_pipeline(&tickets, &client, counter.as_ref(), &settings).await?;
    info!("merged {} summary rows", rows.len());

    if let Some(path) = &cli.out {
        writer::write_csv(&rows, path, writer::DEFAULT_CSV_COLUMNS)?;
        info!("wrote CSV report to {}", path.display());
    }
    if let Some(path) = &cli.markdown {
        writer::write_markdown(&rows, path)?;
        info!("wrote Markdown report to {}", path.display());
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
