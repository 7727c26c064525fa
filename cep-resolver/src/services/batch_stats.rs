//! Batch input parsing, time estimate and result statistics

use super::batch_resolver::BatchResult;
use crate::types::{normalize_digits, LookupStatus};
use serde::Serialize;
use std::collections::HashMap;

/// Average time observed per code when resolved through ordered fallback
pub const AVERAGE_MS_PER_CODE: u64 = 800;

/// Per-chunk throttle overhead
pub const CHUNK_OVERHEAD_MS: u64 = 200;

/// Tokens of a pasted batch, split into usable codes and rejects
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedBatchInput {
    /// Normalized 8-digit codes, input order, duplicates kept
    pub valid: Vec<String>,
    /// Tokens as typed that do not hold 8 digits
    pub invalid: Vec<String>,
    pub total: usize,
}

/// Split on newlines, commas and whitespace
///
/// ```
/// use cep_resolver::services::batch_stats::parse_batch_input;
///
/// let parsed = parse_batch_input("01001-000, 20040020\n123");
/// assert_eq!(parsed.valid, vec!["01001000", "20040020"]);
/// assert_eq!(parsed.invalid, vec!["123"]);
/// assert_eq!(parsed.total, 3);
/// ```
pub fn parse_batch_input(input: &str) -> ParsedBatchInput {
    let mut parsed = ParsedBatchInput::default();

    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        parsed.total += 1;
        let digits = normalize_digits(token);
        if digits.len() == 8 {
            parsed.valid.push(digits);
        } else {
            parsed.invalid.push(token.to_string());
        }
    }

    parsed
}

/// Rough wall-clock estimate for a batch, in milliseconds
pub fn estimate_processing_time(count: usize, chunk_size: usize) -> u64 {
    let count = count as u64;
    let chunk_size = chunk_size.max(1) as u64;
    count * AVERAGE_MS_PER_CODE / chunk_size + count.div_ceil(chunk_size) * CHUNK_OVERHEAD_MS
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceUsage {
    pub source: String,
    pub count: usize,
}

/// Summary of a finished (or cancelled) batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub found: usize,
    pub not_found: usize,
    pub errors: usize,
    pub total_response_time_ms: u64,
    pub average_response_time_ms: f64,
    /// Sources by number of found rows, most used first
    pub top_sources: Vec<SourceUsage>,
    /// Found rows as a percentage of all rows
    pub success_rate: f64,
}

impl BatchStats {
    pub fn from_results(results: &[BatchResult]) -> Self {
        let total = results.len();
        let count = |status| results.iter().filter(|r| r.status == status).count();
        let found = count(LookupStatus::Found);
        let not_found = count(LookupStatus::NotFound);
        let errors = count(LookupStatus::Error);

        let total_response_time_ms: u64 = results.iter().map(|r| r.response_time_ms).sum();

        let mut usage: HashMap<&str, usize> = HashMap::new();
        for row in results.iter().filter(|r| r.is_found()) {
            *usage.entry(row.source.as_str()).or_default() += 1;
        }
        let mut top_sources: Vec<SourceUsage> = usage
            .into_iter()
            .map(|(source, count)| SourceUsage {
                source: source.to_string(),
                count,
            })
            .collect();
        top_sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));

        let (average_response_time_ms, success_rate) = if total > 0 {
            (
                total_response_time_ms as f64 / total as f64,
                found as f64 / total as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            total,
            found,
            not_found,
            errors,
            total_response_time_ms,
            average_response_time_ms,
            top_sources,
            success_rate,
        }
    }
}
