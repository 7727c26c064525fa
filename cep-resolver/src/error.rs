//! Error types for cep-resolver
//!
//! Two layers:
//! - `SourceError` is raised inside an adapter and never crosses the adapter
//!   boundary; it is converted into a `SourceFailure` value.
//! - `ResolveError` is what callers of the resolvers can see.

use thiserror::Error;

/// Hard errors surfaced to callers of the resolution services
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Input does not normalize to an 8-digit postal code (no I/O performed)
    #[error("Invalid postal code '{0}': must contain exactly 8 digits")]
    InvalidFormat(String),

    /// Address search is missing a required field (no I/O performed)
    #[error("Invalid address query: {0}")]
    InvalidQuery(String),

    /// Ordered fallback tried every source without success
    #[error("Postal code {postal_code} not found in any source: {}", .reasons.join("; "))]
    NotFoundAnywhere {
        postal_code: String,
        reasons: Vec<String>,
    },

    /// Batch stopped by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// cep-common error (configuration, I/O)
    #[error(transparent)]
    Common(#[from] cep_common::Error),
}

/// Result type for resolver operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Adapter-internal failure, classified for the human-readable reason
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Network error, timeout, non-2xx status, or unparseable body
    #[error("{0}")]
    Unavailable(String),

    /// Source reached but it has no record for the code
    #[error("{0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_anywhere_concatenates_reasons() {
        let err = ResolveError::NotFoundAnywhere {
            postal_code: "99999999".to_string(),
            reasons: vec![
                "BrasilAPI: HTTP 404".to_string(),
                "ViaCEP: CEP não encontrado".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Postal code 99999999 not found in any source: BrasilAPI: HTTP 404; ViaCEP: CEP não encontrado"
        );
    }

    #[test]
    fn test_common_error_is_transparent() {
        let err: ResolveError = cep_common::Error::Config("bad value".to_string()).into();
        assert_eq!(err.to_string(), "Configuration error: bad value");
    }
}
