//! Address search (reverse lookup)
//!
//! Validates the query, then asks a single reverse-lookup provider. Every
//! accepted query yields at least one row: misses and provider errors come
//! back as rows echoing the query, never as errors.

use crate::adapters::ReverseLookupSource;
use crate::error::{ResolveError, ResolveResult, SourceError};
use crate::types::{AddressCandidate, AddressQuery, LookupStatus};
use std::sync::Arc;
use tracing::{info, warn};

/// The 27 federative units
pub const STATE_CODES: [&str; 27] = [
    "AC", "AL", "AP", "AM", "BA", "CE", "DF", "ES", "GO", "MA", "MT", "MS", "MG", "PA", "PB",
    "PR", "PE", "PI", "RJ", "RN", "RS", "RO", "RR", "SC", "SP", "SE", "TO",
];

/// Whether `code` is a Brazilian state code (case-insensitive)
pub fn is_valid_state(code: &str) -> bool {
    let code = code.trim().to_uppercase();
    STATE_CODES.contains(&code.as_str())
}

/// Reject queries missing city or a valid state
pub fn validate_query(query: &AddressQuery) -> ResolveResult<()> {
    if query.city.trim().is_empty() {
        return Err(ResolveError::InvalidQuery("city is required".to_string()));
    }
    if query.state.trim().is_empty() {
        return Err(ResolveError::InvalidQuery("state is required".to_string()));
    }
    if !is_valid_state(&query.state) {
        return Err(ResolveError::InvalidQuery(format!(
            "unknown state code '{}'",
            query.state.trim()
        )));
    }
    Ok(())
}

pub struct AddressSearchResolver {
    source: Arc<dyn ReverseLookupSource>,
}

impl AddressSearchResolver {
    pub fn new(source: Arc<dyn ReverseLookupSource>) -> Self {
        Self { source }
    }

    /// Candidate postal codes for a structured address
    ///
    /// # Errors
    /// `InvalidQuery` when city or state is missing or the state is unknown.
    pub async fn search(&self, query: &AddressQuery) -> ResolveResult<Vec<AddressCandidate>> {
        validate_query(query)?;

        let candidates = match self.source.search(query).await {
            Ok(records) if !records.is_empty() => {
                info!(
                    city = %query.city,
                    state = %query.state,
                    candidates = records.len(),
                    "Address search matched"
                );
                records
                    .into_iter()
                    .map(|record| AddressCandidate {
                        summary: record.summary(),
                        postal_code: Some(record.postal_code.clone()),
                        status: LookupStatus::Found,
                        record: Some(record),
                    })
                    .collect()
            }
            Ok(_) | Err(SourceError::NotFound(_)) => vec![echo(query, LookupStatus::NotFound)],
            Err(SourceError::Unavailable(reason)) => {
                warn!(
                    source = self.source.name(),
                    reason = %reason,
                    "Address search failed"
                );
                vec![echo(query, LookupStatus::Error)]
            }
        };

        Ok(candidates)
    }
}

fn echo(query: &AddressQuery, status: LookupStatus) -> AddressCandidate {
    AddressCandidate {
        summary: query.summary(),
        postal_code: None,
        status,
        record: None,
    }
}
