//! Source adapters
//!
//! Five independent postal-code providers behind the `SourceAdapter` trait,
//! plus the reverse-lookup provider used by address search.
//!
//! # Adapters (default priority order)
//! 1. **brasilapi** - BrasilAPI v1
//! 2. **awesomeapi** - AwesomeAPI (coordinates, DDD, IBGE)
//! 3. **viacep** - ViaCEP
//! 4. **apicep** - APICEP
//! 5. **widenet** - WideNet
//!
//! Adapters never fail past their boundary: every problem becomes a
//! `SourceResult::Failure`. They hold no shared state besides the HTTP client.

pub mod apicep;
pub mod awesomeapi;
pub mod brasilapi;
pub mod http;
pub mod reverse;
pub mod viacep;
pub mod widenet;

pub use apicep::ApiCepAdapter;
pub use awesomeapi::AwesomeApiAdapter;
pub use brasilapi::BrasilApiAdapter;
pub use http::{build_client, JsonProvider, JsonSource, DEFAULT_TIMEOUT_MS};
pub use reverse::{ReverseLookupSource, ViaCepReverse};
pub use viacep::ViaCepAdapter;
pub use widenet::WideNetAdapter;

use crate::error::{ResolveError, ResolveResult};
use crate::types::SourceAdapter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Adapter ids in default priority order
pub const KNOWN_SOURCE_IDS: [&str; 5] = [
    brasilapi::BrasilApi::ID,
    awesomeapi::AwesomeApi::ID,
    viacep::ViaCep::ID,
    apicep::ApiCep::ID,
    widenet::WideNet::ID,
];

fn json_source<P: JsonProvider>(
    client: reqwest::Client,
    base_url: Option<&str>,
    timeout: Duration,
) -> Arc<dyn SourceAdapter> {
    let source = match base_url {
        Some(url) => JsonSource::<P>::with_base_url(client, url),
        None => JsonSource::<P>::new(client),
    };
    Arc::new(source.with_timeout(timeout))
}

/// Build one adapter by id; None for unknown ids
pub fn build_adapter(
    id: &str,
    client: reqwest::Client,
    base_url: Option<&str>,
    timeout: Duration,
) -> Option<Arc<dyn SourceAdapter>> {
    let adapter = match id {
        "brasilapi" => json_source::<brasilapi::BrasilApi>(client, base_url, timeout),
        "awesomeapi" => json_source::<awesomeapi::AwesomeApi>(client, base_url, timeout),
        "viacep" => json_source::<viacep::ViaCep>(client, base_url, timeout),
        "apicep" => json_source::<apicep::ApiCep>(client, base_url, timeout),
        "widenet" => json_source::<widenet::WideNet>(client, base_url, timeout),
        _ => return None,
    };
    Some(adapter)
}

/// Build adapters in the given priority order
///
/// # Errors
/// `Config` error naming the first unknown id.
pub fn build_adapters(
    order: &[String],
    base_urls: &BTreeMap<String, String>,
    client: &reqwest::Client,
    timeout: Duration,
) -> ResolveResult<Vec<Arc<dyn SourceAdapter>>> {
    order
        .iter()
        .map(|id| {
            build_adapter(
                id,
                client.clone(),
                base_urls.get(id).map(String::as_str),
                timeout,
            )
            .ok_or_else(|| {
                ResolveError::Common(cep_common::Error::Config(format!(
                    "Unknown source id: {}",
                    id
                )))
            })
        })
        .collect()
}

/// All five adapters against production endpoints
pub fn default_adapters(client: &reqwest::Client) -> Vec<Arc<dyn SourceAdapter>> {
    KNOWN_SOURCE_IDS
        .iter()
        .filter_map(|id| {
            build_adapter(
                id,
                client.clone(),
                None,
                Duration::from_millis(DEFAULT_TIMEOUT_MS),
            )
        })
        .collect()
}

// ============================================================================
// Mock Adapter for Testing
// ============================================================================
