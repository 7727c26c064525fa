//! ViaCEP source (`/ws/{cep}/json/`)
//!
//! Unknown codes answer 200 with `{"erro": true}` (older deployments send the
//! string `"true"`).

use super::http::{digits, optional, record_code, required, text, JsonProvider, JsonSource};
use crate::error::SourceError;
use crate::types::{CanonicalAddress, PostalCode};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct ViaCepPayload {
    pub cep: Option<String>,
    pub logradouro: Option<String>,
    pub complemento: Option<String>,
    pub bairro: Option<String>,
    pub localidade: Option<String>,
    pub uf: Option<String>,
    pub ibge: Option<String>,
    pub ddd: Option<String>,
    pub erro: Option<Value>,
}

impl ViaCepPayload {
    /// Whether the payload is ViaCEP's not-found marker
    pub fn is_error(&self) -> bool {
        match &self.erro {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Convert into the canonical record
    pub fn into_address(
        self,
        requested: &PostalCode,
        source_name: &str,
    ) -> Result<CanonicalAddress, SourceError> {
        if self.is_error() {
            return Err(SourceError::NotFound("CEP não encontrado".to_string()));
        }

        let mut address = CanonicalAddress::new(
            record_code(self.cep.as_deref(), requested),
            text(self.logradouro),
            text(self.bairro),
            required(self.localidade, "city")?,
            required(self.uf, "state")?,
            source_name,
        );
        address.complement = optional(self.complemento);
        address.area_code = digits(self.ddd);
        address.ibge_code = digits(self.ibge);
        Ok(address)
    }
}

pub struct ViaCep;

impl JsonProvider for ViaCep {
    type Payload = ViaCepPayload;

    const ID: &'static str = "viacep";
    const NAME: &'static str = "ViaCEP";
    const DEFAULT_BASE_URL: &'static str = "https://viacep.com.br";

    fn url(base_url: &str, cep: &PostalCode) -> String {
        format!("{}/ws/{}/json/", base_url, cep)
    }

    fn normalize(
        payload: ViaCepPayload,
        requested: &PostalCode,
    ) -> Result<CanonicalAddress, SourceError> {
        payload.into_address(requested, Self::NAME)
    }
}

pub type ViaCepAdapter = JsonSource<ViaCep>;

#[cfg(test)]
mod tests {
    use super::*;

    fn requested() -> PostalCode {
        PostalCode::parse("01001000").unwrap()
    }

    #[test]
    fn test_normalize_record() {
        let payload: ViaCepPayload = serde_json::from_str(
            r#"{
                "cep": "01001-000",
                "logradouro": "Praça da Sé",
                "complemento": "lado ímpar",
                "bairro": "Sé",
                "localidade": "São Paulo",
                "uf": "SP",
                "ibge": "3550308",
                "gia": "1004",
                "ddd": "11",
                "siafi": "7107"
            }"#,
        )
        .unwrap();

        let address = ViaCep::normalize(payload, &requested()).unwrap();
        assert_eq!(address.postal_code.as_str(), "01001000");
        assert_eq!(address.city, "São Paulo");
        assert_eq!(address.complement.as_deref(), Some("lado ímpar"));
        assert_eq!(address.ibge_code.as_deref(), Some("3550308"));
        assert_eq!(address.latitude, None);
    }

    #[test]
    fn test_error_flag_bool_and_string() {
        for body in [r#"{"erro": true}"#, r#"{"erro": "true"}"#] {
            let payload: ViaCepPayload = serde_json::from_str(body).unwrap();
            assert_eq!(
                ViaCep::normalize(payload, &requested()).unwrap_err(),
                SourceError::NotFound("CEP não encontrado".to_string())
            );
        }
    }

    #[test]
    fn test_blank_complement_is_none() {
        let payload: ViaCepPayload = serde_json::from_str(
            r#"{"cep":"01001-000","logradouro":"","complemento":"","bairro":"","localidade":"São Paulo","uf":"SP"}"#,
        )
        .unwrap();

        let address = ViaCep::normalize(payload, &requested()).unwrap();
        assert_eq!(address.complement, None);
        assert_eq!(address.street, "");
    }
}
