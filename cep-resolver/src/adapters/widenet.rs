//! WideNet source (`/busca-cep/api/cep.json?code={cep}`)
//!
//! Misses come back as 2xx with `"status": "error"` or without an address.

use super::http::{record_code, required, text, JsonProvider, JsonSource};
use crate::error::SourceError;
use crate::types::{CanonicalAddress, PostalCode};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct WideNetPayload {
    pub code: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "neighborhood")]
    pub district: Option<String>,
    pub address: Option<String>,
    pub status: Option<Value>,
}

impl WideNetPayload {
    fn is_error(&self) -> bool {
        let flagged = matches!(&self.status, Some(Value::String(s)) if s.eq_ignore_ascii_case("error"));
        let blank = self.address.as_deref().map_or(true, |a| a.trim().is_empty());
        flagged || blank
    }
}

pub struct WideNet;

impl JsonProvider for WideNet {
    type Payload = WideNetPayload;

    const ID: &'static str = "widenet";
    const NAME: &'static str = "WideNet";
    const DEFAULT_BASE_URL: &'static str = "https://cep.widenet.host";

    fn url(base_url: &str, cep: &PostalCode) -> String {
        format!("{}/busca-cep/api/cep.json?code={}", base_url, cep)
    }

    fn normalize(
        payload: WideNetPayload,
        requested: &PostalCode,
    ) -> Result<CanonicalAddress, SourceError> {
        if payload.is_error() {
            return Err(SourceError::NotFound("CEP não encontrado".to_string()));
        }

        Ok(CanonicalAddress::new(
            record_code(payload.code.as_deref(), requested),
            text(payload.address),
            text(payload.district),
            required(payload.city, "city")?,
            required(payload.state, "state")?,
            Self::NAME,
        ))
    }
}

pub type WideNetAdapter = JsonSource<WideNet>;
