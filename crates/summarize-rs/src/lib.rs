//! Token-budgeted support-ticket summarizer.
//!
//! `summarize-rs` ingests a CSV of support tickets, packs them into
//! token-bounded chunks, asks a chat-completions model to extract key
//! points per chunk, merges the results into one ordered list, and writes
//! CSV/Markdown reports. The interesting part is the [`chunker`]: packing
//! variable-length, token-counted tickets into bounded groups under
//! simultaneous constraints (token budget, record ceiling, optional
//! overlap) while guaranteeing no ticket is ever dropped — a ticket larger
//! than the whole budget still ships as its own chunk.
//!
//! # Getting started
//!
//! ```ignore
//! use summarize_rs::api::ModelClient;
//! use summarize_rs::settings::{CliOverrides, Settings};
//! use summarize_rs::tokens::BpeTokenCounter;
//! use summarize_rs::{loader, pipeline, writer};
//!
//! let settings = Settings::resolve(&CliOverrides::default())?;
//! let tickets = loader::load_tickets("tickets.csv".as_ref(), settings.csv_delimiter)?;
//! let client = ModelClient::new(std::env::var("OPENAI_API_KEY").unwrap(), &settings)?;
//! let counter = BpeTokenCounter::for_model(&settings.model)?;
//!
//! let rows = pipeline::run_pipeline(&tickets, &client, &counter, &settings).await?;
//! writer::write_csv(&rows, "report.csv".as_ref(), writer::DEFAULT_CSV_COLUMNS)?;
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`settings`] | Immutable configuration: defaults < `SUMM_*` environment < CLI |
//! | [`loader`] | [`Ticket`](loader::Ticket) records parsed from delimited text |
//! | [`tokens`] | [`TokenCounter`](tokens::TokenCounter) trait, tiktoken BPE + heuristic impls |
//! | [`chunker`] | The core packer: bounded and sliding-window policies |
//! | [`api`] | Chat-completions client, retry with backoff, the summarizer seam |
//! | [`merge`] | Flatten, filter, and order per-chunk model output |
//! | [`writer`] | CSV and Markdown report rendering |
//! | [`pipeline`] | Orchestration: pack → fan out → merge → enrich |
//!
//! # Design notes
//!
//! 1. **Configuration is a value.** [`Settings`](settings::Settings) is
//!    resolved once at startup and passed by reference — no component reads
//!    ambient state mid-run.
//!
//! 2. **The packer never loses data.** Every ticket lands in exactly one
//!    chunk (bounded mode) or at least one chunk (sliding mode); oversized
//!    tickets ship alone instead of erroring, looping, or vanishing.
//!
//! 3. **Bad chunks degrade, bad files fail.** A chunk whose model call
//!    exhausts its retries contributes nothing and the run continues; a
//!    malformed input file fails before any output is written.

pub mod api;
pub mod chunker;
pub mod loader;
pub mod merge;
pub mod pipeline;
pub mod settings;
pub mod tokens;
pub mod writer;

pub use api::{ChunkSummarizer, ModelClient, RetryConfig};
pub use chunker::{CHUNK_SEPARATOR, PackConfig, PackPolicy, pack};
pub use loader::{Ticket, load_tickets};
pub use merge::{ORDER_KEY, SummaryEntry, merge_results};
pub use settings::Settings;
pub use tokens::{BpeTokenCounter, HeuristicTokenCounter, TokenCounter};
