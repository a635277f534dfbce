//! Chunk packing: grouping formatted tickets into token-bounded chunks.
//!
//! This is the core of the pipeline. Given an ordered ticket list, a token
//! limit, and a [`PackPolicy`], [`pack`] produces chunk strings — formatted
//! tickets joined with [`CHUNK_SEPARATOR`] — such that every ticket lands in
//! a chunk and no chunk exceeds the limit, with one escape valve: a ticket
//! whose formatted form alone exceeds the limit is emitted as its own chunk
//! rather than dropped.
//!
//! The two policies are deliberately distinct strategies behind one
//! interface, not variations of one function:
//!
//! - [`PackPolicy::Bounded`] — greedy single pass; a chunk closes when it
//!   holds `max_records` tickets or the next ticket would blow the token
//!   limit. No overlap.
//! - [`PackPolicy::SlidingWindow`] — two-pointer pass closing purely on the
//!   token limit; consecutive chunks re-include a tail of the previous
//!   window up to `overlap_tokens`, so context spanning a chunk boundary is
//!   seen twice by the model.
//!
//! Token counting is treated as expensive: each ticket's cost is computed
//! exactly once per call, up front.

use crate::loader::Ticket;
use crate::tokens::TokenCounter;

/// Separator placed between formatted tickets within a chunk.
pub const CHUNK_SEPARATOR: &str = "---";

/// Chunk-closing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackPolicy {
    /// Close on ticket count or token limit, whichever trips first.
    Bounded { max_records: usize },
    /// Close on token limit only; the next window re-includes up to
    /// `overlap_tokens` worth of trailing tickets from the closed one.
    SlidingWindow { overlap_tokens: usize },
}

/// Packing parameters, validated before any counting happens.
#[derive(Debug, Clone)]
pub struct PackConfig {
    /// Token budget per chunk.
    pub chunk_token_limit: usize,
    pub policy: PackPolicy,
}

impl PackConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_token_limit == 0 {
            return Err("chunk token limit must be positive".to_string());
        }
        if let PackPolicy::Bounded { max_records } = self.policy
            && max_records == 0
        {
            return Err("max records per chunk must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Pack tickets into chunk strings under `config`.
///
/// Empty input yields an empty chunk list, not an error.
pub fn pack(
    tickets: &[Ticket],
    counter: &dyn TokenCounter,
    config: &PackConfig,
) -> Result<Vec<String>, String> {
    config.validate()?;
    if tickets.is_empty() {
        return Ok(Vec::new());
    }

    let formatted: Vec<String> = tickets.iter().map(Ticket::formatted).collect();
    let costs: Vec<usize> = formatted.iter().map(|f| counter.count(f)).collect();
    let separator_cost = counter.count(CHUNK_SEPARATOR);

    let chunks = match config.policy {
        PackPolicy::Bounded { max_records } => pack_bounded(
            &formatted,
            &costs,
            separator_cost,
            config.chunk_token_limit,
            max_records,
        ),
        PackPolicy::SlidingWindow { overlap_tokens } => pack_sliding(
            &formatted,
            &costs,
            separator_cost,
            config.chunk_token_limit,
            overlap_tokens,
        ),
    };
    Ok(chunks)
}

/// Greedy single pass: append tickets to the open chunk, closing it first
/// when it is full by count or when the next ticket (plus separator) would
/// exceed the limit. A first ticket that alone exceeds the limit still opens
/// a chunk — the close check only fires on non-empty chunks, so it is
/// emitted as an oversized singleton when the next ticket arrives.
fn pack_bounded(
    formatted: &[String],
    costs: &[usize],
    separator_cost: usize,
    limit: usize,
    max_records: usize,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut members: Vec<&str> = Vec::new();
    let mut member_tokens = 0usize;

    for (item, &cost) in formatted.iter().zip(costs) {
        if !members.is_empty()
            && (members.len() >= max_records
                || member_tokens + separator_cost + cost > limit)
        {
            chunks.push(members.join(CHUNK_SEPARATOR));
            members.clear();
            member_tokens = 0;
        }

        if !members.is_empty() {
            member_tokens += separator_cost;
        }
        member_tokens += cost;
        members.push(item);
    }

    if !members.is_empty() {
        chunks.push(members.join(CHUNK_SEPARATOR));
    }
    chunks
}

/// Two-pointer pass with overlap. After emitting the window `[start, end)`,
/// the next start is found by walking backward from `end - 1` accumulating
/// cost (separators included) while it stays within `overlap_tokens` — then
/// clamped to be strictly greater than the current start. The clamp is the
/// termination guard: without it, an overlap budget large enough to cover
/// the whole window would stall the scan forever.
fn pack_sliding(
    formatted: &[String],
    costs: &[usize],
    separator_cost: usize,
    limit: usize,
    overlap_tokens: usize,
) -> Vec<String> {
    let total = formatted.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        // Grow the window while the next ticket still fits.
        let mut end = start;
        let mut window_tokens = 0usize;
        while end < total {
            let added = if end == start {
                costs[end]
            } else {
                separator_cost + costs[end]
            };
            if window_tokens + added > limit {
                break;
            }
            window_tokens += added;
            end += 1;
        }

        if end == start {
            // Not even the first ticket fits: emit it alone, never drop it.
            chunks.push(formatted[start].clone());
            start += 1;
            continue;
        }

        chunks.push(formatted[start..end].join(CHUNK_SEPARATOR));

        if end == total {
            break;
        }

        // Walk backward from the window's last ticket, keeping tickets while
        // the accumulated overlap stays within budget.
        let mut overlap_start = end;
        let mut overlap_cost = 0usize;
        while overlap_start > start + 1 {
            let candidate = overlap_start - 1;
            let added = if overlap_start == end {
                costs[candidate]
            } else {
                separator_cost + costs[candidate]
            };
            if overlap_cost + added > overlap_tokens {
                break;
            }
            overlap_cost += added;
            overlap_start = candidate;
        }

        // Must strictly advance past the previous window's start.
        start = overlap_start.max(start + 1);
    }

    chunks
}
