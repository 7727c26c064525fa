//! Test Helper Utilities
//!
//! Shared utilities for cep-resolver integration tests: counting mock
//! sources, a stub reverse-lookup provider, a service builder and a minimal
//! local HTTP server for adapter tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cep_common::config::TomlConfig;
use cep_resolver::adapters::ReverseLookupSource;
use cep_resolver::config::ResolverConfig;
use cep_resolver::error::SourceError;
use cep_resolver::types::{
    AddressQuery, CanonicalAddress, FailureKind, PostalCode, SourceAdapter, SourceResult,
};
use cep_resolver::CepService;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ============================================================================
// Mock source
// ============================================================================

/// Which codes a mock source knows
#[derive(Debug, Clone)]
pub enum Knows {
    Everything,
    Nothing,
    Only(Vec<&'static str>),
}

/// Source adapter counting lookups and probes
pub struct MockSource {
    id: String,
    name: String,
    knows: Knows,
    online: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    probes: AtomicUsize,
}

impl MockSource {
    pub fn new(name: &str, knows: Knows) -> Arc<Self> {
        Arc::new(Self {
            id: name.to_lowercase(),
            name: name.to_string(),
            knows,
            online: AtomicBool::new(true),
            delay: None,
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn slow(name: &str, knows: Knows, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: name.to_lowercase(),
            name: name.to_string(),
            knows,
            online: AtomicBool::new(true),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(&self, cep: &PostalCode) -> SourceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let known = match &self.knows {
            Knows::Everything => true,
            Knows::Nothing => false,
            Knows::Only(codes) => codes.contains(&cep.as_str()),
        };

        if known {
            SourceResult::Success(CanonicalAddress::new(
                cep.clone(),
                "Praça da Sé",
                "Sé",
                "São Paulo",
                "SP",
                &self.name,
            ))
        } else {
            SourceResult::failure(&self.name, FailureKind::NotFoundAtSource, "unknown code", 1)
        }
    }

    async fn probe(&self, _reference: &PostalCode) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.online.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Stub reverse lookup
// ============================================================================

pub struct StubReverse {
    calls: AtomicUsize,
}

impl StubReverse {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseLookupSource for StubReverse {
    fn name(&self) -> &str {
        "Stub"
    }

    async fn search(&self, _query: &AddressQuery) -> Result<Vec<CanonicalAddress>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

// ============================================================================
// Service builders
// ============================================================================

/// Built-in defaults with the given batch chunk size
pub fn test_config(chunk_size: usize) -> ResolverConfig {
    let mut toml = TomlConfig::default();
    toml.batch.chunk_size = chunk_size;
    ResolverConfig::from_toml(&toml).expect("default config is valid")
}

/// Service over mock sources, in the given priority order
pub fn service_with(sources: &[Arc<MockSource>], config: &ResolverConfig) -> CepService {
    let adapters: Vec<Arc<dyn SourceAdapter>> = sources
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn SourceAdapter>)
        .collect();
    CepService::new(adapters, StubReverse::new(), config)
}

/// Total lookups across sources
pub fn total_calls(sources: &[Arc<MockSource>]) -> usize {
    sources.iter().map(|s| s.calls()).sum()
}

// ============================================================================
// Local HTTP server
// ============================================================================

/// Serve canned responses on 127.0.0.1; returns the base URL
///
/// `handler` maps a request path (with query) to `(status, json body)`.
/// One request per connection.
pub async fn serve_json<F>(handler: F) -> String
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    match stream.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            read += n;
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
                                break;
                            }
                        }
                    }
                }

                let request = String::from_utf8_lossy(&buf[..read]);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let (status, body) = handler(&path);
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}
