//! Address search integration tests

mod helpers;

use cep_resolver::adapters::ViaCepReverse;
use cep_resolver::services::AddressSearchResolver;
use cep_resolver::types::{AddressQuery, LookupStatus, SourceAdapter};
use cep_resolver::{CepService, ResolveError};
use helpers::{serve_json, test_config, StubReverse};
use std::sync::Arc;

fn query(street: Option<&str>, neighborhood: &str, city: &str, state: &str) -> AddressQuery {
    AddressQuery {
        street: street.map(str::to_string),
        neighborhood: neighborhood.to_string(),
        city: city.to_string(),
        state: state.to_string(),
    }
}

#[tokio::test]
async fn test_missing_city_is_rejected_before_any_call() {
    let reverse = StubReverse::new();
    let service = CepService::new(
        Vec::<Arc<dyn SourceAdapter>>::new(),
        reverse.clone(),
        &test_config(5),
    );

    let err = service
        .search_by_address(&query(None, "Sé", "", "SP"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidQuery(_)));

    let err = service
        .search_by_address(&query(None, "Sé", "São Paulo", "XX"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidQuery(ref m) if m.contains("XX")));

    assert_eq!(reverse.calls(), 0);
}

#[tokio::test]
async fn test_viacep_reverse_lists_every_match() {
    let base_url = serve_json(|path| {
        if path.starts_with("/ws/SP/") {
            (
                200,
                r#"[
                    {"cep": "01001-000", "logradouro": "Praça da Sé", "bairro": "Sé",
                     "localidade": "São Paulo", "uf": "SP"},
                    {"cep": "01001-001", "logradouro": "Praça da Sé", "bairro": "Sé",
                     "localidade": "São Paulo", "uf": "SP"},
                    {"logradouro": "sem código", "localidade": "São Paulo", "uf": "SP"}
                ]"#
                .to_string(),
            )
        } else {
            (404, "{}".to_string())
        }
    })
    .await;

    let reverse = ViaCepReverse::with_base_url(reqwest::Client::new(), base_url);
    let resolver = AddressSearchResolver::new(Arc::new(reverse));

    let candidates = resolver
        .search(&query(Some("Praça da Sé"), "", "São Paulo", "sp"))
        .await
        .unwrap();

    assert_eq!(candidates.len(), 2, "entries without a code are dropped");
    assert!(candidates.iter().all(|c| c.status == LookupStatus::Found));
    assert_eq!(candidates[0].postal_code.as_ref().unwrap().as_str(), "01001000");
    assert_eq!(candidates[1].summary, "Praça da Sé, Sé, São Paulo - SP");
}

#[tokio::test]
async fn test_no_match_echoes_the_query() {
    let base_url = serve_json(|_| (400, r#"{"erro": true}"#.to_string())).await;
    let reverse = ViaCepReverse::with_base_url(reqwest::Client::new(), base_url);
    let resolver = AddressSearchResolver::new(Arc::new(reverse));

    let q = query(None, "Centro", "Rio de Janeiro", "RJ");
    let candidates = resolver.search(&q).await.unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].status, LookupStatus::NotFound);
    assert_eq!(candidates[0].summary, q.summary());
    assert!(candidates[0].postal_code.is_none());
}

#[tokio::test]
async fn test_unreachable_source_yields_error_row() {
    // Nothing listens on the discard port
    let reverse = ViaCepReverse::with_base_url(reqwest::Client::new(), "http://127.0.0.1:9");
    let resolver = AddressSearchResolver::new(Arc::new(reverse));

    let candidates = resolver
        .search(&query(Some("Rua Augusta"), "", "São Paulo", "SP"))
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].status, LookupStatus::Error);
}
