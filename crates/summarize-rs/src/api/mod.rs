//! Model API layer: the chat-completions client and its retry policy.
//!
//! - [`client`] — [`ModelClient`](client::ModelClient): HTTP calls to the
//!   chat-completions endpoint, lenient parsing of the model's JSON output.
//! - [`retry`] — transient error detection (429, 5xx, network timeouts)
//!   with exponential backoff and jitter. Never retries 400/401 errors.
//!
//! The pipeline depends only on the [`ChunkSummarizer`] trait, so tests can
//! swap the network client for scripted doubles.

use std::pin::Pin;

use crate::merge::SummaryEntry;

pub mod client;
pub mod retry;

pub use client::ModelClient;
pub use retry::RetryConfig;

/// Boxed future returned by [`ChunkSummarizer::summarize`].
pub type SummarizeFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<SummaryEntry>, String>> + Send + 'a>>;

/// Anything that can turn one chunk of formatted tickets into summary
/// entries. Implementations own their retry behavior; an `Err` means the
/// chunk is unrecoverable and the caller decides whether to degrade.
pub trait ChunkSummarizer: Sync {
    fn summarize(&self, chunk_text: &str) -> SummarizeFuture<'_>;
}
