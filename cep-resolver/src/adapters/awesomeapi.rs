//! AwesomeAPI source (`/json/{cep}`)
//!
//! Richest payload of the set: coordinates, address type, DDD and IBGE code.
//! Invalid codes may come back as a 2xx body carrying `"status": 400`.

use super::http::{
    digits, optional, payload_status, record_code, required, scalar_text, text, JsonProvider,
    JsonSource,
};
use crate::error::SourceError;
use crate::types::{CanonicalAddress, PostalCode};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct AwesomeApiPayload {
    pub cep: Option<String>,
    pub address_type: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub lat: Option<Value>,
    pub lng: Option<Value>,
    pub ddd: Option<Value>,
    pub city_ibge: Option<Value>,
    pub status: Option<Value>,
    pub message: Option<String>,
}

pub struct AwesomeApi;

impl JsonProvider for AwesomeApi {
    type Payload = AwesomeApiPayload;

    const ID: &'static str = "awesomeapi";
    const NAME: &'static str = "AwesomeAPI";
    const DEFAULT_BASE_URL: &'static str = "https://cep.awesomeapi.com.br";

    fn url(base_url: &str, cep: &PostalCode) -> String {
        format!("{}/json/{}", base_url, cep)
    }

    fn normalize(
        payload: AwesomeApiPayload,
        requested: &PostalCode,
    ) -> Result<CanonicalAddress, SourceError> {
        if matches!(payload_status(payload.status.as_ref()), Some(code) if code >= 400) {
            let reason = optional(payload.message).unwrap_or_else(|| "CEP inválido".to_string());
            return Err(SourceError::NotFound(reason));
        }

        let mut address = CanonicalAddress::new(
            record_code(payload.cep.as_deref(), requested),
            text(payload.address),
            text(payload.district),
            required(payload.city, "city")?,
            required(payload.state, "state")?,
            Self::NAME,
        );
        address.address_type = optional(payload.address_type);
        address.latitude = scalar_text(payload.lat);
        address.longitude = scalar_text(payload.lng);
        address.area_code = digits(scalar_text(payload.ddd));
        address.ibge_code = digits(scalar_text(payload.city_ibge));
        Ok(address)
    }
}

pub type AwesomeApiAdapter = JsonSource<AwesomeApi>;
