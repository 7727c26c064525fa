//! JSON-over-HTTP source adapter
//!
//! Every provider is a GET keyed by the 8-digit code that returns a JSON
//! object. `JsonSource<P>` owns the request, timeout and status handling;
//! a `JsonProvider` only describes its URL and how its payload maps onto a
//! `CanonicalAddress`.

use crate::error::SourceError;
use crate::types::{normalize_digits, CanonicalAddress, PostalCode, SourceAdapter, SourceResult};
use async_trait::async_trait;
use cep_common::time::duration_to_millis;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("cep-resolver/", env!("CARGO_PKG_VERSION"));

/// Fixed per-call timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Provider description consumed by `JsonSource`
pub trait JsonProvider: Send + Sync + 'static {
    /// Provider payload shape
    type Payload: DeserializeOwned + Send;

    /// Stable lowercase id
    const ID: &'static str;

    /// Display name used as `source_name`
    const NAME: &'static str;

    /// Production base URL
    const DEFAULT_BASE_URL: &'static str;

    /// Lookup URL for a code
    fn url(base_url: &str, cep: &PostalCode) -> String;

    /// Map a 2xx payload onto the canonical record, or classify it as a miss
    fn normalize(
        payload: Self::Payload,
        requested: &PostalCode,
    ) -> Result<CanonicalAddress, SourceError>;
}

/// Build the shared HTTP client
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// Adapter for any `JsonProvider`
pub struct JsonSource<P: JsonProvider> {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    _provider: PhantomData<fn() -> P>,
}

impl<P: JsonProvider> JsonSource<P> {
    /// Adapter against the provider's production endpoint
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, P::DEFAULT_BASE_URL)
    }

    /// Adapter against a custom base URL (mirror, local stub)
    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            _provider: PhantomData,
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lookup URL for a code
    pub fn url_for(&self, cep: &PostalCode) -> String {
        P::url(&self.base_url, cep)
    }

    async fn fetch(&self, cep: &PostalCode) -> Result<P::Payload, SourceError> {
        let url = self.url_for(cep);
        debug!(source = P::NAME, cep = %cep, url = %url, "Querying source");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        response
            .json::<P::Payload>()
            .await
            .map_err(|e| SourceError::Unavailable(format!("Invalid response: {}", e)))
    }
}

#[async_trait]
impl<P: JsonProvider> SourceAdapter for JsonSource<P> {
    fn id(&self) -> &str {
        P::ID
    }

    fn name(&self) -> &str {
        P::NAME
    }

    async fn resolve(&self, cep: &PostalCode) -> SourceResult {
        let started = Instant::now();
        let outcome = match self.fetch(cep).await {
            Ok(payload) => P::normalize(payload, cep),
            Err(e) => Err(e),
        };
        let elapsed_ms = duration_to_millis(started.elapsed());

        match &outcome {
            Ok(address) => debug!(
                source = P::NAME,
                cep = %cep,
                city = %address.city,
                elapsed_ms,
                "Source returned record"
            ),
            Err(e) => warn!(
                source = P::NAME,
                cep = %cep,
                error = %e,
                elapsed_ms,
                "Source lookup failed"
            ),
        }

        SourceResult::from_outcome(P::NAME, outcome, elapsed_ms)
    }

    async fn probe(&self, reference: &PostalCode) -> bool {
        let url = self.url_for(reference);
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(source = P::NAME, error = %e, "Probe request failed");
                false
            }
        }
    }
}

// ============================================================================
// Error classification
// ============================================================================

fn transport_error(err: &reqwest::Error, timeout: Duration) -> SourceError {
    if err.is_timeout() {
        SourceError::Unavailable(format!("Timeout after {} ms", timeout.as_millis()))
    } else {
        SourceError::Unavailable(format!("Network error: {}", err))
    }
}

/// 400/404 mean "no such code"; everything else is transient
pub(crate) fn status_error(status: StatusCode) -> SourceError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
            SourceError::NotFound(format!("HTTP {}", status.as_u16()))
        }
        _ => SourceError::Unavailable(format!("HTTP {}", status.as_u16())),
    }
}

// ============================================================================
// Payload helpers shared by providers
// ============================================================================

/// Trimmed, non-empty text or None
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trimmed text, empty when absent
pub(crate) fn text(value: Option<String>) -> String {
    optional(value).unwrap_or_default()
}

/// Field that must be present for the record to be usable
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, SourceError> {
    optional(value)
        .ok_or_else(|| SourceError::NotFound(format!("Incomplete record: missing {}", field)))
}

/// Provider's code when it normalizes to 8 digits, else the requested one
pub(crate) fn record_code(provider_code: Option<&str>, requested: &PostalCode) -> PostalCode {
    provider_code
        .and_then(|code| PostalCode::parse(code).ok())
        .unwrap_or_else(|| requested.clone())
}

/// Numeric status embedded in a payload (number or numeric string)
pub(crate) fn payload_status(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text of a scalar that some providers send as either string or number
pub(crate) fn scalar_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => optional(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Digits-only form of a provider field, None when blank
pub(crate) fn digits(value: Option<String>) -> Option<String> {
    optional(value)
        .map(|v| normalize_digits(&v))
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_error_classification() {
        assert_eq!(
            status_error(StatusCode::NOT_FOUND),
            SourceError::NotFound("HTTP 404".to_string())
        );
        assert_eq!(
            status_error(StatusCode::BAD_REQUEST),
            SourceError::NotFound("HTTP 400".to_string())
        );
        assert_eq!(
            status_error(StatusCode::SERVICE_UNAVAILABLE),
            SourceError::Unavailable("HTTP 503".to_string())
        );
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            SourceError::Unavailable("HTTP 429".to_string())
        );
    }

    #[test]
    fn test_required_and_optional() {
        assert_eq!(optional(Some("  ".to_string())), None);
        assert_eq!(optional(Some(" Sé ".to_string())), Some("Sé".to_string()));
        assert_eq!(text(None), "");
        assert!(matches!(
            required(Some(String::new()), "city"),
            Err(SourceError::NotFound(msg)) if msg == "Incomplete record: missing city"
        ));
    }

    #[test]
    fn test_record_code_falls_back_to_requested() {
        let requested = PostalCode::parse("01001000").unwrap();
        assert_eq!(record_code(Some("01001-000"), &requested).as_str(), "01001000");
        assert_eq!(record_code(Some("garbage"), &requested), requested);
        assert_eq!(record_code(None, &requested), requested);
    }

    #[test]
    fn test_payload_status_accepts_number_or_string() {
        assert_eq!(payload_status(Some(&json!(400))), Some(400));
        assert_eq!(payload_status(Some(&json!("404"))), Some(404));
        assert_eq!(payload_status(Some(&json!("error"))), None);
        assert_eq!(payload_status(None), None);
    }

    #[test]
    fn test_scalar_text() {
        assert_eq!(scalar_text(Some(json!("-23.55"))), Some("-23.55".to_string()));
        assert_eq!(scalar_text(Some(json!(11))), Some("11".to_string()));
        assert_eq!(scalar_text(Some(json!(null))), None);
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_millis(DEFAULT_TIMEOUT_MS)).is_ok());
    }
}
