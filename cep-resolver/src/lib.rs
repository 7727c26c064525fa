//! cep-resolver library interface
//!
//! Multi-source Brazilian postal code (CEP) resolution: ordered fallback and
//! all-sources lookup, chunked batch resolution with pause/resume/cancel, and
//! reverse lookup by address. `CepService` wires the services together and is
//! the surface the CLI (and any UI) talks to.

pub mod adapters;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

pub use crate::error::{ResolveError, ResolveResult};

use crate::adapters::{build_adapters, build_client, ReverseLookupSource, ViaCepReverse};
use crate::config::ResolverConfig;
use crate::services::{
    AddressSearchResolver, BatchControl, BatchItem, BatchReport, BatchResolver, HealthTracker,
    LookupMode, LookupOutcome, ResultCache, SingleLookupResolver,
};
use crate::types::{AddressCandidate, AddressQuery, SourceAdapter, SourceHealth};
use cep_common::events::{BatchProgress, EventBus};
use std::sync::Arc;
use tracing::info;

/// Event bus capacity per subscriber
const EVENT_BUS_CAPACITY: usize = 100;

/// Consumer-facing facade over the resolution services
pub struct CepService {
    lookup: Arc<SingleLookupResolver>,
    batch: BatchResolver,
    search: AddressSearchResolver,
    health: Arc<HealthTracker>,
    cache: Arc<ResultCache>,
    event_bus: EventBus,
}

impl CepService {
    /// Production adapters per the resolved configuration
    pub fn from_config(config: &ResolverConfig) -> ResolveResult<Self> {
        let client = build_client(config.timeout).map_err(|e| {
            ResolveError::Common(cep_common::Error::Internal(format!(
                "HTTP client setup failed: {}",
                e
            )))
        })?;

        let adapters =
            build_adapters(&config.source_order, &config.base_urls, &client, config.timeout)?;

        let reverse = match config.base_urls.get("viacep") {
            Some(url) => ViaCepReverse::with_base_url(client, url.clone()),
            None => ViaCepReverse::new(client),
        };

        info!(
            sources = %config.source_order.join(","),
            timeout_ms = config.timeout.as_millis() as u64,
            "Resolution services configured"
        );
        Ok(Self::new(
            adapters,
            Arc::new(reverse.with_timeout(config.timeout)),
            config,
        ))
    }

    /// Services over caller-supplied adapters (tests, embedding)
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        reverse: Arc<dyn ReverseLookupSource>,
        config: &ResolverConfig,
    ) -> Self {
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
        let cache = Arc::new(ResultCache::new(config.cache_ttl));
        let health = Arc::new(
            HealthTracker::new(adapters.clone(), config.probe_reference.clone())
                .with_timeout(config.timeout)
                .with_event_bus(event_bus.clone()),
        );
        let lookup = Arc::new(
            SingleLookupResolver::new(adapters, Arc::clone(&cache), Arc::clone(&health))
                .with_health_refresh(config.refresh_health),
        );
        let batch = BatchResolver::new(Arc::clone(&lookup), config.batch.clone())
            .with_event_bus(event_bus.clone());

        Self {
            lookup,
            batch,
            search: AddressSearchResolver::new(reverse),
            health,
            cache,
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Resolve one postal code
    pub async fn lookup_single(&self, input: &str, mode: LookupMode) -> ResolveResult<LookupOutcome> {
        self.lookup.lookup(input, mode).await
    }

    /// Control handle for the next batch; keep a clone to pause or cancel
    pub fn new_batch_job(&self) -> BatchControl {
        self.batch.new_job()
    }

    /// Resolve many items; `None` uses the configured concurrency limit
    pub async fn lookup_batch<F>(
        &self,
        items: &[BatchItem],
        concurrency_limit: Option<usize>,
        control: &BatchControl,
        on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(BatchProgress) + Send,
    {
        let limit = concurrency_limit.unwrap_or(self.batch.settings().concurrency_limit);
        self.batch.run(items, limit, control, on_progress).await
    }

    /// Candidate postal codes for a structured address
    pub async fn search_by_address(&self, query: &AddressQuery) -> ResolveResult<Vec<AddressCandidate>> {
        self.search.search(query).await
    }

    /// Last known health of every source, without probing
    pub async fn source_health(&self) -> Vec<SourceHealth> {
        self.health.status().await
    }

    /// Probe every source, then return the fresh snapshot
    pub async fn refresh_source_health(&self) -> Vec<SourceHealth> {
        self.health.refresh_all().await;
        self.health.status().await
    }
}
