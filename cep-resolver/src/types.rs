//! Core Types and Trait Definitions for cep-resolver
//!
//! Defines the canonical data model shared by every resolution service and
//! the `SourceAdapter` trait that each external provider implements.
//!
//! # Data flow
//! - Adapters turn provider payloads into `SourceResult` values
//! - The single-lookup resolver collects them into a `SourceResultMap`
//!   (all-sources mode) or stops at the first success (ordered fallback)
//! - The batch resolver turns each outcome into a status row

use crate::error::{ResolveError, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Postal code
// ============================================================================

/// Normalized Brazilian postal code (CEP): exactly 8 ASCII digits
///
/// Formatting (`NNNNN-NNN`) is a display concern; the stored value never
/// contains separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    /// Strip every non-digit and require exactly 8 digits
    ///
    /// ```
    /// use cep_resolver::types::PostalCode;
    ///
    /// let cep = PostalCode::parse("01001-000").unwrap();
    /// assert_eq!(cep.as_str(), "01001000");
    /// assert!(PostalCode::parse("0100100").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let digits = normalize_digits(input);
        if digits.len() == 8 {
            Ok(Self(digits))
        } else {
            Err(ResolveError::InvalidFormat(input.to_string()))
        }
    }

    /// The 8 digits without formatting
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form `NNNNN-NNN`
    pub fn format(&self) -> String {
        format!("{}-{}", &self.0[..5], &self.0[5..])
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = ResolveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(code: PostalCode) -> Self {
        code.0
    }
}

/// Keep only ASCII digits
pub fn normalize_digits(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

// ============================================================================
// Canonical record and per-source outcome
// ============================================================================

/// Canonical address record produced by any source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAddress {
    pub postal_code: PostalCode,
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    /// Two-letter state code (UF)
    pub state_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
    /// Telephone area code (DDD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_code: Option<String>,
    /// IBGE municipality code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ibge_code: Option<String>,
    /// Display name of the source that produced the record
    pub source_name: String,
}

impl CanonicalAddress {
    /// Record with the required fields; optional fields start empty
    pub fn new(
        postal_code: PostalCode,
        street: impl Into<String>,
        neighborhood: impl Into<String>,
        city: impl Into<String>,
        state_code: impl Into<String>,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            postal_code,
            street: street.into(),
            neighborhood: neighborhood.into(),
            city: city.into(),
            state_code: state_code.into(),
            complement: None,
            address_type: None,
            latitude: None,
            longitude: None,
            area_code: None,
            ibge_code: None,
            source_name: source_name.into(),
        }
    }

    /// One-line summary `street, neighborhood, city - UF`
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, {} - {}",
            self.street, self.neighborhood, self.city, self.state_code
        )
    }
}

/// Why a source produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network error, timeout, non-2xx, unparseable body
    SourceUnavailable,
    /// Source answered but has no record
    NotFoundAtSource,
}

/// Failed outcome of one source call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source_name: String,
    pub kind: FailureKind,
    pub reason: String,
    pub elapsed_ms: u64,
}

/// Outcome of one source call; exactly one variant is active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SourceResult {
    Success(CanonicalAddress),
    Failure(SourceFailure),
}

impl SourceResult {
    /// Build a failure value
    pub fn failure(
        source_name: impl Into<String>,
        kind: FailureKind,
        reason: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        SourceResult::Failure(SourceFailure {
            source_name: source_name.into(),
            kind,
            reason: reason.into(),
            elapsed_ms,
        })
    }

    /// Convert an adapter-internal outcome into a result value
    pub fn from_outcome(
        source_name: &str,
        outcome: Result<CanonicalAddress, SourceError>,
        elapsed_ms: u64,
    ) -> Self {
        match outcome {
            Ok(address) => SourceResult::Success(address),
            Err(SourceError::Unavailable(reason)) => {
                Self::failure(source_name, FailureKind::SourceUnavailable, reason, elapsed_ms)
            }
            Err(SourceError::NotFound(reason)) => {
                Self::failure(source_name, FailureKind::NotFoundAtSource, reason, elapsed_ms)
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SourceResult::Success(_))
    }

    /// Record when successful
    pub fn address(&self) -> Option<&CanonicalAddress> {
        match self {
            SourceResult::Success(address) => Some(address),
            SourceResult::Failure(_) => None,
        }
    }

    /// Name of the source that produced this outcome
    pub fn source_name(&self) -> &str {
        match self {
            SourceResult::Success(address) => &address.source_name,
            SourceResult::Failure(failure) => &failure.source_name,
        }
    }
}

/// Row status used by batch results, address search and display rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupStatus {
    #[serde(rename = "Encontrado")]
    Found,
    #[serde(rename = "Não encontrado")]
    NotFound,
    #[serde(rename = "Erro")]
    Error,
}

impl LookupStatus {
    /// Label shown to users
    pub fn label(&self) -> &'static str {
        match self {
            LookupStatus::Found => "Encontrado",
            LookupStatus::NotFound => "Não encontrado",
            LookupStatus::Error => "Erro",
        }
    }
}

impl fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display row derived from one entry of a `SourceResultMap`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub source: String,
    pub status: LookupStatus,
    /// Address summary on success, failure reason otherwise
    pub summary: String,
}

/// Per-source outcomes keyed by source name, in query order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceResultMap(IndexMap<String, SourceResult>);

impl SourceResultMap {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, source_name: impl Into<String>, result: SourceResult) {
        self.0.insert(source_name.into(), result);
    }

    pub fn get(&self, source_name: &str) -> Option<&SourceResult> {
        self.0.get(source_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SourceResult)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether at least one source succeeded
    pub fn has_success(&self) -> bool {
        self.0.values().any(SourceResult::is_success)
    }

    /// First successful record in query order
    pub fn first_success(&self) -> Option<&CanonicalAddress> {
        self.0.values().find_map(SourceResult::address)
    }

    /// Flatten into display rows, one per source
    pub fn rows(&self) -> Vec<SourceRow> {
        self.0
            .iter()
            .map(|(source, result)| match result {
                SourceResult::Success(address) => SourceRow {
                    source: source.clone(),
                    status: LookupStatus::Found,
                    summary: address.summary(),
                },
                SourceResult::Failure(failure) => SourceRow {
                    source: source.clone(),
                    status: LookupStatus::NotFound,
                    summary: failure.reason.clone(),
                },
            })
            .collect()
    }
}

// ============================================================================
// Address search
// ============================================================================

/// Structured address used for reverse lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressQuery {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub neighborhood: String,
    pub city: String,
    /// Two-letter state code (UF)
    pub state: String,
}

impl AddressQuery {
    /// Echo of the query in the `street, neighborhood, city - UF` shape
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, {} - {}",
            self.street.as_deref().unwrap_or_default(),
            self.neighborhood,
            self.city,
            self.state
        )
    }
}

/// One candidate returned by address search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressCandidate {
    pub summary: String,
    pub postal_code: Option<PostalCode>,
    pub status: LookupStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<CanonicalAddress>,
}

// ============================================================================
// Source health
// ============================================================================

/// Online status and latency of one source, as last measured by a probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source_id: String,
    pub source_name: String,
    pub is_online: bool,
    pub last_checked_at: DateTime<Utc>,
    pub last_response_time_ms: u64,
}

// ============================================================================
// Source adapter trait
// ============================================================================

/// One external postal-code provider behind a uniform interface
///
/// Implementations never return errors: every failure is reported as a
/// `SourceResult::Failure` carrying a human-readable reason and the elapsed
/// time. Adapters do not touch the cache or the health tracker.
///
/// # Example
/// ```rust,ignore
/// use cep_resolver::types::{SourceAdapter, SourceResult, PostalCode};
///
/// pub struct StaticSource;
///
/// #[async_trait::async_trait]
/// impl SourceAdapter for StaticSource {
///     fn id(&self) -> &str { "static" }
///     fn name(&self) -> &str { "Static" }
///
///     async fn resolve(&self, cep: &PostalCode) -> SourceResult {
///         SourceResult::Success(CanonicalAddress::new(
///             cep.clone(), "Praça da Sé", "Sé", "São Paulo", "SP", self.name(),
///         ))
///     }
///
///     async fn probe(&self, _reference: &PostalCode) -> bool { true }
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable lowercase identifier (health tracking, configuration)
    fn id(&self) -> &str;

    /// Display name, used as `source_name` in results
    fn name(&self) -> &str;

    /// Look up one normalized postal code
    async fn resolve(&self, cep: &PostalCode) -> SourceResult;

    /// Lightweight reachability check against a known-valid code
    ///
    /// Returns true when the source answered with a 2xx status.
    async fn probe(&self, reference: &PostalCode) -> bool;
}
