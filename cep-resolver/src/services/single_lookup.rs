//! Single postal-code resolution
//!
//! Two policies behind one entry point:
//! - **Ordered fallback**: sources one at a time in priority order, first
//!   success wins, `NotFoundAnywhere` when every source misses. Not cached.
//! - **All sources**: every registered source concurrently, every outcome
//!   collected. A total failure triggers one ordered-fallback pass whose
//!   result is folded in under `Sistema Unificado` on success, `Sistema` on
//!   failure. The completed map is cached.
//!
//! Validation happens before any cache or network access.

use super::health_tracker::HealthTracker;
use super::result_cache::ResultCache;
use crate::error::{ResolveError, ResolveResult};
use crate::types::{
    CanonicalAddress, FailureKind, PostalCode, SourceAdapter, SourceResult, SourceResultMap,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Map key for a successful fallback entry of an all-sources lookup
pub const UNIFIED_SOURCE_NAME: &str = "Sistema Unificado";

/// Source label for outcomes no provider produced
pub const SYSTEM_SOURCE: &str = "Sistema";

/// Resolution policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    #[default]
    OrderedFallback,
    AllSources,
}

/// Unified record (ordered fallback) or per-source map (all sources)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "result", rename_all = "snake_case")]
pub enum LookupOutcome {
    Unified(CanonicalAddress),
    PerSource(SourceResultMap),
}

pub struct SingleLookupResolver {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cache: Arc<ResultCache>,
    health: Arc<HealthTracker>,
    refresh_health: bool,
}

impl SingleLookupResolver {
    /// Adapters are tried in the order given
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        cache: Arc<ResultCache>,
        health: Arc<HealthTracker>,
    ) -> Self {
        Self {
            adapters,
            cache,
            health,
            refresh_health: true,
        }
    }

    /// Probe every source before each lookup that reaches the network
    pub fn with_health_refresh(mut self, enabled: bool) -> Self {
        self.refresh_health = enabled;
        self
    }

    pub fn adapters(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    /// Validate and resolve one user-supplied code
    ///
    /// # Errors
    /// - `InvalidFormat` when the input does not hold exactly 8 digits
    /// - `NotFoundAnywhere` when ordered fallback exhausts every source
    pub async fn lookup(&self, input: &str, mode: LookupMode) -> ResolveResult<LookupOutcome> {
        let cep = PostalCode::parse(input)?;

        match mode {
            LookupMode::OrderedFallback => {
                self.refresh_health_if_enabled().await;
                self.resolve_ordered(&cep).await.map(LookupOutcome::Unified)
            }
            LookupMode::AllSources => {
                if let Some(cached) = self.cache.get(&cep) {
                    return Ok(LookupOutcome::PerSource(cached));
                }
                self.refresh_health_if_enabled().await;
                Ok(LookupOutcome::PerSource(self.resolve_all(&cep).await))
            }
        }
    }

    /// Ordered fallback for an already-normalized code
    ///
    /// Sources currently marked offline are tried last, never skipped.
    pub async fn resolve_ordered(&self, cep: &PostalCode) -> ResolveResult<CanonicalAddress> {
        let mut reasons = Vec::new();

        for adapter in self.priority_order().await {
            match adapter.resolve(cep).await {
                SourceResult::Success(address) => {
                    info!(cep = %cep, source = adapter.name(), "Postal code resolved");
                    return Ok(address);
                }
                SourceResult::Failure(failure) => {
                    debug!(
                        cep = %cep,
                        source = adapter.name(),
                        reason = %failure.reason,
                        "Falling back to next source"
                    );
                    reasons.push(format!("{}: {}", failure.source_name, failure.reason));
                }
            }
        }

        warn!(cep = %cep, attempts = reasons.len(), "No source returned a record");
        Err(ResolveError::NotFoundAnywhere {
            postal_code: cep.to_string(),
            reasons,
        })
    }

    /// Fan out to every source and cache the completed map
    pub async fn resolve_all(&self, cep: &PostalCode) -> SourceResultMap {
        let futures = self.adapters.iter().map(|adapter| {
            let adapter = Arc::clone(adapter);
            async move {
                let result = adapter.resolve(cep).await;
                (adapter.name().to_string(), result)
            }
        });

        let mut results = SourceResultMap::new();
        for (name, result) in join_all(futures).await {
            results.insert(name, result);
        }

        if !results.has_success() {
            match self.resolve_ordered(cep).await {
                Ok(mut address) => {
                    address.source_name = format!("{} (Fallback)", address.source_name);
                    results.insert(UNIFIED_SOURCE_NAME, SourceResult::Success(address));
                }
                Err(e) => results.insert(
                    SYSTEM_SOURCE,
                    SourceResult::failure(
                        SYSTEM_SOURCE,
                        FailureKind::NotFoundAtSource,
                        e.to_string(),
                        0,
                    ),
                ),
            }
        }

        info!(
            cep = %cep,
            sources = results.len(),
            found = results.has_success(),
            "All-sources lookup complete"
        );
        self.cache.put(cep, results.clone());
        results
    }

    /// Online sources first, then offline ones, each group in priority order
    async fn priority_order(&self) -> Vec<Arc<dyn SourceAdapter>> {
        let mut online = Vec::with_capacity(self.adapters.len());
        let mut offline = Vec::new();

        for adapter in &self.adapters {
            if self.health.is_online(adapter.id()).await {
                online.push(Arc::clone(adapter));
            } else {
                offline.push(Arc::clone(adapter));
            }
        }

        online.extend(offline);
        online
    }

    async fn refresh_health_if_enabled(&self) {
        if self.refresh_health {
            self.health.refresh_all().await;
        }
    }
}
