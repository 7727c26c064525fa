//! APICEP source (`/cep/{cep}.json`)

use super::http::{optional, payload_status, record_code, required, text, JsonProvider, JsonSource};
use crate::error::SourceError;
use crate::types::{CanonicalAddress, PostalCode};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCepPayload {
    pub code: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub status: Option<Value>,
    pub ok: Option<bool>,
    pub message: Option<String>,
}

pub struct ApiCep;

impl JsonProvider for ApiCep {
    type Payload = ApiCepPayload;

    const ID: &'static str = "apicep";
    const NAME: &'static str = "APICEP";
    const DEFAULT_BASE_URL: &'static str = "https://ws.apicep.com";

    fn url(base_url: &str, cep: &PostalCode) -> String {
        format!("{}/cep/{}.json", base_url, cep)
    }

    fn normalize(
        payload: ApiCepPayload,
        requested: &PostalCode,
    ) -> Result<CanonicalAddress, SourceError> {
        let error_status = matches!(payload_status(payload.status.as_ref()), Some(code) if code >= 400);
        if error_status || payload.ok == Some(false) {
            let reason =
                optional(payload.message).unwrap_or_else(|| "CEP não encontrado".to_string());
            return Err(SourceError::NotFound(reason));
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

pub type ApiCepAdapter = JsonSource<ApiCep>;
