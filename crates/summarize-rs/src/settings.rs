//! Process-wide configuration, resolved once at startup.
//!
//! Settings come from three layers with fixed precedence: command-line
//! overrides beat environment variables, which beat built-in defaults.
//! Environment variables live under the `SUMM_` prefix (`SUMM_MODEL`,
//! `SUMM_CHUNK_OVERLAP`, ...). The resolved [`Settings`] value is immutable
//! and passed by reference into every component that needs it — nothing in
//! the packing or merge path reads ambient state.

use crate::chunker::PackPolicy;

/// Environment variable namespace for all recognized options.
const ENV_PREFIX: &str = "SUMM_";

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Model identifier sent to the API and used for token counting.
    pub model: String,
    /// Total context window of the model, in tokens.
    pub model_context_window: usize,
    /// Tokens reserved for the model's response.
    pub model_response_margin: usize,
    /// Explicit per-chunk token limit. When unset, the limit is derived as
    /// `model_context_window - model_response_margin`.
    pub chunk_token_limit: Option<usize>,
    /// Overlap budget in tokens (sliding-window packing only).
    pub chunk_overlap: usize,
    /// Maximum tickets per chunk (count/token-bounded packing only).
    pub max_records: usize,
    /// Ceiling on model calls per minute; caps the fan-out width.
    pub rate_limit_per_minute: usize,
    /// Field delimiter for the input CSV.
    pub csv_delimiter: char,
    /// Pack with the sliding-window overlap policy instead of the bounded one.
    pub sliding_window: bool,
    /// Maximum concurrent model calls.
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            model_context_window: 128_000,
            model_response_margin: 2_000,
            chunk_token_limit: None,
            chunk_overlap: 50,
            max_records: 25,
            rate_limit_per_minute: 60,
            csv_delimiter: ',',
            sliding_window: false,
            concurrency: 4,
        }
    }
}

/// Command-line overrides, applied on top of environment and defaults.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub chunk_size: Option<usize>,
    pub overlap: Option<usize>,
    pub max_records: Option<usize>,
    pub delimiter: Option<char>,
    pub sliding_window: bool,
    pub concurrency: Option<usize>,
}

impl Settings {
    /// Resolve settings from defaults, the process environment, and CLI
    /// overrides, in ascending precedence. Fails on malformed values
    /// (configuration errors are fatal before any processing begins).
    pub fn resolve(overrides: &CliOverrides) -> Result<Self, String> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Like [`resolve`](Self::resolve), but with an injectable environment
    /// lookup so callers (and tests) never have to mutate process state.
    pub fn resolve_with(
        overrides: &CliOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, String> {
        let mut settings = Self::default();

        // Environment layer.
        if let Some(model) = lookup(&env_key("MODEL")) {
            settings.model = model;
        }
        if let Some(v) = env_parse(&lookup, "MODEL_CONTEXT_WINDOW")? {
            settings.model_context_window = v;
        }
        if let Some(v) = env_parse(&lookup, "MODEL_RESPONSE_MARGIN")? {
            settings.model_response_margin = v;
        }
        if let Some(v) = env_parse(&lookup, "CHUNK_OVERLAP")? {
            settings.chunk_overlap = v;
        }
        if let Some(v) = env_parse(&lookup, "MAX_RECORDS")? {
            settings.max_records = v;
        }
        if let Some(v) = env_parse(&lookup, "RATE_LIMIT_PER_MINUTE")? {
            settings.rate_limit_per_minute = v;
        }
        if let Some(raw) = lookup(&env_key("CSV_DELIMITER")) {
            settings.csv_delimiter = parse_delimiter(&raw)
                .map_err(|e| format!("{}CSV_DELIMITER: {e}", ENV_PREFIX))?;
        }

        // CLI layer.
        if let Some(model) = &overrides.model {
            settings.model = model.clone();
        }
        if let Some(size) = overrides.chunk_size {
            settings.chunk_token_limit = Some(size);
        }
        if let Some(overlap) = overrides.overlap {
            settings.chunk_overlap = overlap;
        }
        if let Some(max_records) = overrides.max_records {
            settings.max_records = max_records;
        }
        if let Some(delimiter) = overrides.delimiter {
            settings.csv_delimiter = delimiter;
        }
        if overrides.sliding_window {
            settings.sliding_window = true;
        }
        if let Some(concurrency) = overrides.concurrency {
            settings.concurrency = concurrency;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Effective per-chunk token limit: the explicit override when set,
    /// otherwise the context window minus the response margin.
    pub fn max_chunk_tokens(&self) -> usize {
        self.chunk_token_limit
            .unwrap_or_else(|| self.model_context_window.saturating_sub(self.model_response_margin))
    }

    /// The packing policy selected by these settings.
    pub fn pack_policy(&self) -> PackPolicy {
        if self.sliding_window {
            PackPolicy::SlidingWindow {
                overlap_tokens: self.chunk_overlap,
            }
        } else {
            PackPolicy::Bounded {
                max_records: self.max_records,
            }
        }
    }

    /// Fan-out width for model calls: the configured concurrency, capped by
    /// the rate-limit ceiling, never below 1.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.min(self.rate_limit_per_minute).max(1)
    }

    fn validate(&self) -> Result<(), String> {
        if self.max_chunk_tokens() == 0 {
            return Err(format!(
                "chunk token limit must be positive (context window {} minus response margin {} \
                 leaves nothing for ticket chunks)",
                self.model_context_window, self.model_response_margin,
            ));
        }
        if !self.sliding_window && self.max_records == 0 {
            return Err("max records per chunk must be at least 1".to_string());
        }
        if !self.csv_delimiter.is_ascii() {
            return Err(format!(
                "CSV delimiter must be a single ASCII character, got '{}'",
                self.csv_delimiter,
            ));
        }
        Ok(())
    }
}

fn env_key(name: &str) -> String {
    format!("{ENV_PREFIX}{name}")
}

/// Read and parse a numeric environment value; a present-but-malformed value
/// is a configuration error naming the variable.
fn env_parse(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<usize>, String> {
    let key = env_key(name);
    match lookup(&key) {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| format!("{key} must be a non-negative integer, got '{raw}'")),
        None => Ok(None),
    }
}

/// Parse a delimiter spec into a single character. Accepts the literal
/// character or the escape `\t` for tab.
pub fn parse_delimiter(raw: &str) -> Result<char, String> {
    if raw == "\\t" {
        return Ok('\t');
    }
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single character, got '{raw}'")),
    }
}
