//! BrasilAPI source (`/api/cep/v1/{cep}`)
//!
//! Misses are reported with HTTP 404, so any 2xx body is a record.

use super::http::{record_code, required, text, JsonProvider, JsonSource};
use crate::error::SourceError;
use crate::types::{CanonicalAddress, PostalCode};
use serde::Deserialize;

/// BrasilAPI v1 payload
#[derive(Debug, Clone, Deserialize)]
pub struct BrasilApiPayload {
    pub cep: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub neighborhood: Option<String>,
    pub street: Option<String>,
}

pub struct BrasilApi;

impl JsonProvider for BrasilApi {
    type Payload = BrasilApiPayload;

    const ID: &'static str = "brasilapi";
    const NAME: &'static str = "BrasilAPI";
    const DEFAULT_BASE_URL: &'static str = "https://brasilapi.com.br";

    fn url(base_url: &str, cep: &PostalCode) -> String {
        format!("{}/api/cep/v1/{}", base_url, cep)
    }

    fn normalize(
        payload: BrasilApiPayload,
        requested: &PostalCode,
    ) -> Result<CanonicalAddress, SourceError> {
        Ok(CanonicalAddress::new(
            record_code(payload.cep.as_deref(), requested),
            text(payload.street),
            text(payload.neighborhood),
            required(payload.city, "city")?,
            required(payload.state, "state")?,
            Self::NAME,
        ))
    }
}

pub type BrasilApiAdapter = JsonSource<BrasilApi>;
