//! HTTP client for the chat-completions API.
//!
//! One call per chunk: the chunk text goes out as the user message with a
//! fixed system prompt requesting JSON, and the response content is parsed
//! leniently — malformed model output degrades to an empty entry list with
//! a warning, it never fails the call. Only transport and HTTP-status
//! problems surface as errors, in the message shapes the retry classifier
//! inspects.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::retry::{RetryConfig, retry_call};
use crate::api::{ChunkSummarizer, SummarizeFuture};
use crate::merge::SummaryEntry;
use crate::settings::Settings;

/// Default chat-completions endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "\
You summarise support tickets. The user message is a chunk of tickets, each \
formatted as [<ticket number>] <description> and separated by ---. Respond \
with a JSON object of the form {\"summaries\": [{\"incident\": \"<ticket \
number>\", \"summary\": \"<key points>\"}]} containing one entry per ticket \
in the chunk.";

/// Async HTTP client for chunk summarization.
pub struct ModelClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryConfig,
}

impl ModelClient {
    /// Create a client for the configured model. The response token cap is
    /// the settings' response margin — the same reservation the chunk
    /// budget already subtracts from the context window.
    pub fn new(api_key: impl Into<String>, settings: &Settings) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("summarize-rs/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: OPENAI_URL.to_string(),
            model: settings.model.clone(),
            max_tokens: settings.model_response_margin as u32,
            temperature: 0.3,
            retry: RetryConfig::default(),
        })
    }

    /// Point the client at a different chat-completions endpoint.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Send one chunk for summarization (single attempt, no retry).
    pub async fn summarize_chunk(&self, chunk_text: &str) -> Result<Vec<SummaryEntry>, String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: chunk_text,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        debug!(
            "summarize request: model={}, chunk={} chars, max_tokens={}",
            self.model,
            chunk_text.len(),
            self.max_tokens,
        );
        let start = Instant::now();

        let resp = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "summarize response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len(),
        );

        if !status.is_success() {
            return Err(format!("Summarizer API HTTP {status}: {text}"));
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(err) = parsed.error {
            return Err(format!("Summarizer API error: {}", err.message));
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content);

        match content {
            Some(content) => Ok(parse_summary_entries(&content)),
            None => {
                warn!("model response had no content, contributing no summaries");
                Ok(Vec::new())
            }
        }
    }
}

impl ChunkSummarizer for ModelClient {
    fn summarize(&self, chunk_text: &str) -> SummarizeFuture<'_> {
        let chunk = chunk_text.to_string();
        Box::pin(async move { retry_call(&self.retry, || self.summarize_chunk(&chunk)).await })
    }
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
}

#[derive(Deserialize)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    message: String,
}

// ── Output parsing ─────────────────────────────────────────────────

/// Parse the model's content into summary entries, accepting the shapes
/// models actually produce: `{"summaries": [...]}`, the legacy
/// `{"key_points": [...]}`, or a bare top-level array. Non-object items
/// and unrecognized shapes are dropped with a log line, never an error —
/// a malformed response must not take down the run.
fn parse_summary_entries(content: &str) -> Vec<SummaryEntry> {
    let parsed: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            warn!("model returned non-JSON content, contributing no summaries: {e}");
            return Vec::new();
        }
    };

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("summaries").or_else(|| map.remove("key_points")) {
            Some(Value::Array(items)) => items,
            _ => {
                warn!("model output missing a 'summaries' array, contributing no summaries");
                return Vec::new();
            }
        },
        _ => {
            warn!("model output was not an object or array, contributing no summaries");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            other => {
                debug!("dropping non-object summary item: {other}");
                None
            }
        })
        .collect()
}
