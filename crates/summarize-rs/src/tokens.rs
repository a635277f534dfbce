//! Token counting for chunk packing.
//!
//! The packer only needs a deterministic `text -> token count` function, so
//! the tokenizer is a trait seam: [`BpeTokenCounter`] wraps the tiktoken BPE
//! for the configured model, and [`HeuristicTokenCounter`] estimates from
//! character counts when exact counting isn't worth the tokenizer load (or
//! when a test wants predictable costs).

use tiktoken_rs::{CoreBPE, get_bpe_from_model, o200k_base};
use tracing::debug;

/// Deterministic token counting for a fixed model.
///
/// Implementations must be pure: the same text always yields the same count.
pub trait TokenCounter: Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;
}

/// Exact token counting via the model's BPE vocabulary.
pub struct BpeTokenCounter {
    bpe: CoreBPE,
}

impl BpeTokenCounter {
    /// Resolve the BPE for a model identifier. Unknown models fall back to
    /// the `o200k_base` encoding rather than failing the run.
    pub fn for_model(model: &str) -> Result<Self, String> {
        let bpe = match get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(e) => {
                debug!("no tokenizer registered for model '{model}' ({e}), using o200k_base");
                o200k_base().map_err(|e| format!("failed to load o200k_base tokenizer: {e}"))?
            }
        };
        Ok(Self { bpe })
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Character-count estimate at a fixed chars-per-token ratio.
///
/// Most tokenizers average 3-4 chars per token on English text; 3.5 is the
/// middle-ground default.
pub struct HeuristicTokenCounter {
    chars_per_token: f64,
}

impl HeuristicTokenCounter {
    pub fn with_ratio(chars_per_token: f64) -> Self {
        Self { chars_per_token }
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::with_ratio(3.5)
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        (text.len() as f64 / self.chars_per_token).ceil() as usize
    }
}
