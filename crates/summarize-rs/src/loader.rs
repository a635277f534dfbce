//! Ticket records and CSV loading.
//!
//! The loader is strict about structure and lenient about content: a file
//! missing the `number` or `description` column (or a row missing either
//! value) fails the whole load — a silent partial load is worse than a hard
//! failure — while unparseable dates degrade to `None` and unknown columns
//! are preserved in an open-ended extra-fields bag.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

/// Column holding the ticket identifier.
pub const NUMBER_COLUMN: &str = "number";
/// Column holding the ticket body.
pub const DESCRIPTION_COLUMN: &str = "description";

/// Source column for [`Ticket::original_assignment_group`].
const ORIGINAL_GROUP_COLUMN: &str = "u_original_assignment_group";

/// A support ticket, constructed once from a CSV row and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ticket {
    pub number: String,
    pub description: String,
    pub work_notes: String,
    pub comments: String,
    pub opened_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub assignment_group: String,
    pub original_assignment_group: String,
    /// Any columns not claimed by the typed fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Ticket {
    /// Canonical string form used for token counting and packing. Output
    /// rows are built from the typed fields, never re-parsed from this.
    pub fn formatted(&self) -> String {
        format!("[{}] {}", self.number, self.description)
    }
}

/// Load tickets from a delimited text file.
///
/// Requires `number` and `description` columns; missing either is a fatal
/// configuration error naming the missing column(s). A row with an empty
/// value in either required column rejects the whole file.
pub fn load_tickets(path: &Path, delimiter: char) -> Result<Vec<Ticket>, String> {
    if !delimiter.is_ascii() {
        return Err(format!(
            "CSV delimiter must be a single ASCII character, got '{delimiter}'"
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| format!("failed to open '{}': {e}", path.display()))?;

    let headers = reader
        .headers()
        .map_err(|e| format!("failed to read CSV header: {e}"))?
        .clone();

    let mut missing: Vec<&str> = [NUMBER_COLUMN, DESCRIPTION_COLUMN]
        .into_iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(format!(
            "input CSV is missing required column(s): {}",
            missing.join(", ")
        ));
    }

    let mut tickets = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record.map_err(|e| format!("failed to parse CSV row {row}: {e}"))?;
        tickets.push(ticket_from_row(&headers, &record, row)?);
    }

    debug!("loaded {} tickets from {}", tickets.len(), path.display());
    Ok(tickets)
}

fn ticket_from_row(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    row: usize,
) -> Result<Ticket, String> {
    let mut ticket = Ticket::default();

    for (header, value) in headers.iter().zip(record.iter()) {
        match header {
            NUMBER_COLUMN => ticket.number = value.to_string(),
            DESCRIPTION_COLUMN => ticket.description = value.to_string(),
            "work_notes" => ticket.work_notes = value.to_string(),
            "comments" => ticket.comments = value.to_string(),
            "assignment_group" => ticket.assignment_group = value.to_string(),
            ORIGINAL_GROUP_COLUMN => ticket.original_assignment_group = value.to_string(),
            "opened_at" => ticket.opened_at = parse_datetime(value),
            "resolved_at" => ticket.resolved_at = parse_datetime(value),
            "closed_at" => ticket.closed_at = parse_datetime(value),
            other => {
                ticket.extra.insert(other.to_string(), value.to_string());
            }
        }
    }

    if ticket.number.is_empty() || ticket.description.is_empty() {
        return Err(format!(
            "row {row} is missing a '{NUMBER_COLUMN}' or '{DESCRIPTION_COLUMN}' value"
        ));
    }
    Ok(ticket)
}

/// Lenient timestamp parsing: RFC 3339 first, then a naive
/// `YYYY-MM-DDTHH:MM:SS` assumed UTC. Anything else loads as `None`.
fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    None
}
