//! Reverse lookup: structured address to candidate postal codes
//!
//! ViaCEP is the only provider in the set with a reverse endpoint
//! (`/ws/{UF}/{city}/{street}/json/`). Path segments are percent-encoded.

use super::http::{JsonProvider, DEFAULT_TIMEOUT_MS};
use super::viacep::{ViaCep, ViaCepPayload};
use crate::error::SourceError;
use crate::types::{AddressQuery, CanonicalAddress, PostalCode};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Provider able to list postal codes for a structured address
#[async_trait]
pub trait ReverseLookupSource: Send + Sync {
    fn name(&self) -> &str;

    /// Candidate records; an empty list means no match
    async fn search(&self, query: &AddressQuery) -> Result<Vec<CanonicalAddress>, SourceError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReverseBody {
    List(Vec<ViaCepPayload>),
    Single(ViaCepPayload),
}

pub struct ViaCepReverse {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ViaCepReverse {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, ViaCep::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Search URL; the street segment falls back to the neighborhood
    pub fn url_for(&self, query: &AddressQuery) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SourceError::Unavailable(format!("Invalid base URL: {}", e)))?;

        let street = query
            .street
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| query.neighborhood.trim());
        let state = query.state.trim().to_uppercase();

        url.path_segments_mut()
            .map_err(|_| SourceError::Unavailable("Base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["ws", state.as_str(), query.city.trim(), street, "json", ""]);
        Ok(url)
    }
}

#[async_trait]
impl ReverseLookupSource for ViaCepReverse {
    fn name(&self) -> &str {
        ViaCep::NAME
    }

    async fn search(&self, query: &AddressQuery) -> Result<Vec<CanonicalAddress>, SourceError> {
        let url = self.url_for(query)?;
        debug!(url = %url, "Reverse lookup");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(format!("Network error: {}", e)))?;

        // Any non-2xx here means "no match" for the caller
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::NotFound(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .json::<ReverseBody>()
            .await
            .map_err(|e| SourceError::Unavailable(format!("Invalid response: {}", e)))?;
        Ok(candidates(body))
    }
}

/// Records with a usable code; error markers and incomplete entries are dropped
fn candidates(body: ReverseBody) -> Vec<CanonicalAddress> {
    let payloads = match body {
        ReverseBody::List(items) => items,
        ReverseBody::Single(item) => vec![item],
    };

    payloads
        .into_iter()
        .filter_map(|payload| {
            let code = PostalCode::parse(payload.cep.as_deref()?).ok()?;
            payload.into_address(&code, ViaCep::NAME).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reverse() -> ViaCepReverse {
        ViaCepReverse::new(reqwest::Client::new())
    }

    fn query(street: Option<&str>) -> AddressQuery {
        AddressQuery {
            street: street.map(str::to_string),
            neighborhood: "Sé".to_string(),
            city: "São Paulo".to_string(),
            state: "sp".to_string(),
        }
    }

    #[test]
    fn test_url_encodes_segments() {
        let url = reverse().url_for(&query(Some("Praça da Sé"))).unwrap();
        assert_eq!(
            url.as_str(),
            "https://viacep.com.br/ws/SP/S%C3%A3o%20Paulo/Pra%C3%A7a%20da%20S%C3%A9/json/"
        );
    }

    #[test]
    fn test_url_street_falls_back_to_neighborhood() {
        let url = reverse().url_for(&query(None)).unwrap();
        assert!(url.path().starts_with("/ws/SP/S%C3%A3o%20Paulo/S%C3%A9/json/"));
    }

    #[test]
    fn test_candidates_from_list() {
        let body: ReverseBody = serde_json::from_str(
            r#"[
                {"cep":"01001-000","logradouro":"Praça da Sé","complemento":"lado ímpar","bairro":"Sé","localidade":"São Paulo","uf":"SP"},
                {"cep":"01001-001","logradouro":"Praça da Sé","complemento":"lado par","bairro":"Sé","localidade":"São Paulo","uf":"SP"},
                {"cep":"","logradouro":"broken","localidade":"São Paulo","uf":"SP"}
            ]"#,
        )
        .unwrap();

        let records = candidates(body);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].postal_code.as_str(), "01001001");
        assert_eq!(records[0].complement.as_deref(), Some("lado ímpar"));
    }

    #[test]
    fn test_candidates_error_marker_is_empty() {
        let body: ReverseBody = serde_json::from_str(r#"{"erro": true}"#).unwrap();
        assert!(candidates(body).is_empty());

        let body: ReverseBody = serde_json::from_str("[]").unwrap();
        assert!(candidates(body).is_empty());
    }
}
