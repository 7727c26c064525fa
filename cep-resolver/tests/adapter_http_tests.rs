//! Source adapters against a local HTTP server
//!
//! Exercises the full request path: URL shape, status mapping, payload
//! decoding and normalization.

mod helpers;

use cep_resolver::adapters::{
    build_adapter, build_client, ApiCepAdapter, AwesomeApiAdapter, BrasilApiAdapter,
    ViaCepAdapter, WideNetAdapter,
};
use cep_resolver::types::{FailureKind, PostalCode, SourceAdapter, SourceResult};
use helpers::serve_json;
use std::time::Duration;

fn cep() -> PostalCode {
    PostalCode::parse("01001000").unwrap()
}

fn failure_kind(result: &SourceResult) -> FailureKind {
    match result {
        SourceResult::Failure(failure) => failure.kind,
        SourceResult::Success(address) => panic!("expected failure, got {:?}", address),
    }
}

#[tokio::test]
async fn test_viacep_success_and_error_marker() {
    let base_url = serve_json(|path| match path {
        "/ws/01001000/json/" => (
            200,
            r#"{"cep": "01001-000", "logradouro": "Praça da Sé", "complemento": "lado ímpar",
                "bairro": "Sé", "localidade": "São Paulo", "uf": "SP", "ibge": "3550308",
                "ddd": "11"}"#
                .to_string(),
        ),
        _ => (200, r#"{"erro": "true"}"#.to_string()),
    })
    .await;
    let adapter = ViaCepAdapter::with_base_url(reqwest::Client::new(), base_url);

    let result = adapter.resolve(&cep()).await;
    let address = result.address().expect("record for a known code");
    assert_eq!(address.street, "Praça da Sé");
    assert_eq!(address.city, "São Paulo");
    assert_eq!(address.state_code, "SP");
    assert_eq!(address.source_name, "ViaCEP");

    let missing = adapter.resolve(&PostalCode::parse("99999999").unwrap()).await;
    assert_eq!(failure_kind(&missing), FailureKind::NotFoundAtSource);
}

#[tokio::test]
async fn test_brasilapi_status_mapping() {
    let base_url = serve_json(|path| match path {
        "/api/cep/v1/01001000" => (
            200,
            r#"{"cep": "01001000", "state": "SP", "city": "São Paulo",
                "neighborhood": "Sé", "street": "Praça da Sé"}"#
                .to_string(),
        ),
        "/api/cep/v1/99999999" => (404, r#"{"message": "CEP não encontrado"}"#.to_string()),
        _ => (503, "{}".to_string()),
    })
    .await;
    let adapter = BrasilApiAdapter::with_base_url(reqwest::Client::new(), base_url);

    assert!(adapter.resolve(&cep()).await.is_success());

    let missing = adapter.resolve(&PostalCode::parse("99999999").unwrap()).await;
    assert_eq!(failure_kind(&missing), FailureKind::NotFoundAtSource);

    let down = adapter.resolve(&PostalCode::parse("12345678").unwrap()).await;
    assert_eq!(failure_kind(&down), FailureKind::SourceUnavailable);
    assert!(down.source_name() == "BrasilAPI");
}

#[tokio::test]
async fn test_awesomeapi_carries_coordinates() {
    let base_url = serve_json(|_| {
        (
            200,
            r#"{"cep": "01001000", "address_type": "Praça", "address_name": "da Sé",
                "address": "Praça da Sé", "state": "SP", "district": "Sé",
                "lat": "-23.55", "lng": "-46.63", "city": "São Paulo",
                "city_ibge": "3550308", "ddd": "11"}"#
                .to_string(),
        )
    })
    .await;
    let adapter = AwesomeApiAdapter::with_base_url(reqwest::Client::new(), base_url);

    let result = adapter.resolve(&cep()).await;
    let address = result.address().expect("record");
    assert_eq!(address.latitude.as_deref(), Some("-23.55"));
    assert_eq!(address.longitude.as_deref(), Some("-46.63"));
    assert_eq!(address.area_code.as_deref(), Some("11"));
}

#[tokio::test]
async fn test_widenet_and_apicep_report_misses_in_body() {
    let widenet_url = serve_json(|_| {
        (200, r#"{"status": "error", "message": "CEP não encontrado"}"#.to_string())
    })
    .await;
    let widenet = WideNetAdapter::with_base_url(reqwest::Client::new(), widenet_url);
    assert_eq!(
        failure_kind(&widenet.resolve(&cep()).await),
        FailureKind::NotFoundAtSource
    );

    let apicep_url = serve_json(|_| {
        (200, r#"{"status": 404, "ok": false, "message": "CEP not found"}"#.to_string())
    })
    .await;
    let apicep = ApiCepAdapter::with_base_url(reqwest::Client::new(), apicep_url);
    assert_eq!(
        failure_kind(&apicep.resolve(&cep()).await),
        FailureKind::NotFoundAtSource
    );
}

#[tokio::test]
async fn test_garbage_body_is_unavailable() {
    let base_url = serve_json(|_| (200, "<html>maintenance</html>".to_string())).await;
    let adapter = ViaCepAdapter::with_base_url(reqwest::Client::new(), base_url);

    let result = adapter.resolve(&cep()).await;
    assert_eq!(failure_kind(&result), FailureKind::SourceUnavailable);
}

#[tokio::test]
async fn test_probe_requires_success_status() {
    let up = serve_json(|_| (200, "{}".to_string())).await;
    let down = serve_json(|_| (500, "{}".to_string())).await;
    let client = build_client(Duration::from_secs(2)).unwrap();

    let online = build_adapter("brasilapi", client.clone(), Some(&up), Duration::from_secs(2)).unwrap();
    let offline = build_adapter("brasilapi", client, Some(&down), Duration::from_secs(2)).unwrap();

    assert!(online.probe(&cep()).await);
    assert!(!offline.probe(&cep()).await);
}
