//! End-to-end orchestration: pack, fan out, merge, enrich.
//!
//! The pipeline is pure orchestration over injected collaborators — the
//! summarizer and token counter arrive as trait objects, so the whole flow
//! runs in tests without a network. Model calls fan out with bounded,
//! order-preserving concurrency; a chunk that still fails after the
//! client's retries contributes an empty entry list instead of aborting the
//! run, so one bad chunk can't lose every other chunk's summaries.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::ChunkSummarizer;
use crate::chunker::{PackConfig, pack};
use crate::loader::Ticket;
use crate::merge::{ORDER_KEY, SummaryEntry, merge_results};
use crate::settings::Settings;
use crate::tokens::TokenCounter;

/// Run the full pipeline over an in-memory ticket list, returning the final
/// ordered rows ready for the report writers.
pub async fn run_pipeline(
    tickets: &[Ticket],
    summarizer: &dyn ChunkSummarizer,
    counter: &dyn TokenCounter,
    settings: &Settings,
) -> Result<Vec<SummaryEntry>, String> {
    let config = PackConfig {
        chunk_token_limit: settings.max_chunk_tokens(),
        policy: settings.pack_policy(),
    };
    let chunks = pack(tickets, counter, &config)?;
    info!(
        "packed {} tickets into {} chunks (limit {} tokens)",
        tickets.len(),
        chunks.len(),
        config.chunk_token_limit,
    );

    let results: Vec<Vec<SummaryEntry>> = stream::iter(chunks.iter().enumerate().map(
        |(index, chunk)| async move {
            match summarizer.summarize(chunk).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("chunk {index} failed after retries, contributing no summaries: {e}");
                    Vec::new()
                }
            }
        },
    ))
    .buffered(settings.effective_concurrency())
    .collect()
    .await;

    let merged = merge_results(results);
    Ok(attach_ticket_fields(merged, tickets))
}

/// Join each summary entry back to its source ticket (by the ordering key
/// matching the ticket number) and fill in the ticket's fields. Keys the
/// model already produced are never overwritten, and entries without a
/// matching ticket pass through untouched.
pub fn attach_ticket_fields(
    mut entries: Vec<SummaryEntry>,
    tickets: &[Ticket],
) -> Vec<SummaryEntry> {
    let by_number: HashMap<&str, &Ticket> =
        tickets.iter().map(|t| (t.number.as_str(), t)).collect();

    for entry in &mut entries {
        let Some(number) = entry.get(ORDER_KEY).and_then(Value::as_str).map(str::to_owned)
        else {
            continue;
        };
        let Some(ticket) = by_number.get(number.as_str()) else {
            continue;
        };
        if let Ok(Value::Object(fields)) = serde_json::to_value(ticket) {
            for (key, value) in fields {
                entry.entry(key).or_insert(value);
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SummarizeFuture;
    use crate::chunker::CHUNK_SEPARATOR;
    use serde_json::json;

    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    fn ticket(number: &str, description: &str) -> Ticket {
        Ticket {
            number: number.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    fn settings(chunk_size: usize, max_records: usize) -> Settings {
        Settings {
            chunk_token_limit: Some(chunk_size),
            max_records,
            ..Default::default()
        }
    }

    /// Extract ticket numbers from a chunk and echo one entry per ticket.
    fn echo_entries(chunk: &str) -> Vec<SummaryEntry> {
        chunk
            .split(CHUNK_SEPARATOR)
            .filter_map(|part| {
                let number = part
                    .trim()
                    .trim_start_matches('[')
                    .split(']')
                    .next()?
                    .to_string();
                let mut entry = SummaryEntry::new();
                entry.insert("incident".to_string(), json!(number));
                entry.insert("summary".to_string(), json!(format!("key points for {number}")));
                Some(entry)
            })
            .collect()
    }

    struct EchoSummarizer;

    impl ChunkSummarizer for EchoSummarizer {
        fn summarize(&self, chunk_text: &str) -> SummarizeFuture<'_> {
            let chunk = chunk_text.to_string();
            Box::pin(async move { Ok(echo_entries(&chunk)) })
        }
    }

    /// Fails any chunk mentioning the poisoned ticket, echoes the rest.
    struct PoisonedSummarizer {
        poison: &'static str,
    }

    impl ChunkSummarizer for PoisonedSummarizer {
        fn summarize(&self, chunk_text: &str) -> SummarizeFuture<'_> {
            let chunk = chunk_text.to_string();
            let poison = self.poison;
            Box::pin(async move {
                if chunk.contains(poison) {
                    Err("Summarizer API HTTP 500: boom".to_string())
                } else {
                    Ok(echo_entries(&chunk))
                }
            })
        }
    }

    #[tokio::test]
    async fn summarizes_every_ticket_in_sorted_order() {
        let tickets = vec![
            ticket("c", "gamma issue"),
            ticket("a", "alpha issue"),
            ticket("b", "beta issue"),
        ];
        let rows = run_pipeline(&tickets, &EchoSummarizer, &CharCounter, &settings(30, 2))
            .await
            .unwrap();

        let numbers: Vec<&str> = rows
            .iter()
            .map(|r| r["incident"].as_str().unwrap())
            .collect();
        assert_eq!(numbers, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn attaches_ticket_fields_to_rows() {
        let tickets = vec![ticket("INC1", "the printer is on fire")];
        let rows = run_pipeline(&tickets, &EchoSummarizer, &CharCounter, &settings(100, 5))
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["description"], json!("the printer is on fire"));
        assert_eq!(rows[0]["number"], json!("INC1"));
        // The model's own fields win over attached ticket fields.
        assert_eq!(rows[0]["summary"], json!("key points for INC1"));
    }

    #[tokio::test]
    async fn failing_chunk_degrades_without_losing_others() {
        let tickets = vec![
            ticket("1", "fine"),
            ticket("2", "poisoned"),
            ticket("3", "fine"),
        ];
        // One ticket per chunk so only the poisoned chunk is lost.
        let summarizer = PoisonedSummarizer { poison: "[2]" };
        let rows = run_pipeline(&tickets, &summarizer, &CharCounter, &settings(100, 1))
            .await
            .unwrap();

        let numbers: Vec<&str> = rows
            .iter()
            .map(|r| r["incident"].as_str().unwrap())
            .collect();
        assert_eq!(numbers, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn empty_ticket_list_produces_no_rows() {
        let rows = run_pipeline(&[], &EchoSummarizer, &CharCounter, &settings(100, 5))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn zero_chunk_budget_is_a_configuration_error() {
        let tickets = vec![ticket("1", "x")];
        let bad = Settings {
            chunk_token_limit: Some(0),
            ..Default::default()
        };
        let result = run_pipeline(&tickets, &EchoSummarizer, &CharCounter, &bad).await;
        assert!(result.is_err());
    }

    #[test]
    fn attach_skips_rows_without_matching_ticket() {
        let tickets = vec![ticket("known", "desc")];
        let mut orphan = SummaryEntry::new();
        orphan.insert("incident".to_string(), json!("unknown"));

        let rows = attach_ticket_fields(vec![orphan.clone()], &tickets);
        assert_eq!(rows, vec![orphan]);
    }
}
