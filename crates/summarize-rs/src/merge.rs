//! Merging per-chunk model output into one ordered result list.
//!
//! Pure function over its input: flatten, drop malformed entries, stable
//! sort. Chunk order does not matter — the sort key is intrinsic to each
//! entry, so any permutation of the outer list produces the same output.

use serde_json::Value;

/// One row of model output: an open-shaped JSON object.
pub type SummaryEntry = serde_json::Map<String, Value>;

/// The field entries are ordered by: the ticket identifier echoed back by
/// the model. Comparison is plain lexicographic string ordering — numeric
/// identifiers sort as strings ("10" before "9"), deliberately and
/// uniformly rather than switching semantics per entry.
pub const ORDER_KEY: &str = "incident";

/// Flatten chunk results, drop entries without a usable [`ORDER_KEY`], and
/// stable-sort ascending by it. An entry's key is usable when it is a JSON
/// string or number; anything else (missing, null, nested) is treated as
/// malformed model output and dropped rather than crashing the run.
pub fn merge_results(chunk_results: Vec<Vec<SummaryEntry>>) -> Vec<SummaryEntry> {
    let mut entries: Vec<(String, SummaryEntry)> = chunk_results
        .into_iter()
        .flatten()
        .filter_map(|entry| order_key(&entry).map(|key| (key, entry)))
        .collect();

    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries.into_iter().map(|(_, entry)| entry).collect()
}

/// The sortable form of an entry's ordering key, if it has one.
fn order_key(entry: &SummaryEntry) -> Option<String> {
    match entry.get(ORDER_KEY)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
