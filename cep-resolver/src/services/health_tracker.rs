//! Source health tracking
//!
//! One `SourceHealth` record per registered adapter. Probes hit the adapter's
//! endpoint for a known-valid reference code under their own timeout and
//! update only that source's record. Health is advisory: resolvers reorder by
//! it but never skip a source because of it.

use crate::adapters::DEFAULT_TIMEOUT_MS;
use crate::types::{PostalCode, SourceAdapter, SourceHealth};
use cep_common::events::{EventBus, LookupEvent};
use cep_common::time::duration_to_millis;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Reference code used when none is configured (Praça da Sé, São Paulo)
pub const DEFAULT_PROBE_REFERENCE: &str = "01001000";

pub struct HealthTracker {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    health: RwLock<Vec<SourceHealth>>,
    reference: PostalCode,
    timeout: Duration,
    event_bus: Option<EventBus>,
}

impl HealthTracker {
    /// Every source starts online with no measured latency
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, reference: PostalCode) -> Self {
        let now = Utc::now();
        let health = adapters
            .iter()
            .map(|adapter| SourceHealth {
                source_id: adapter.id().to_string(),
                source_name: adapter.name().to_string(),
                is_online: true,
                last_checked_at: now,
                last_response_time_ms: 0,
            })
            .collect();

        Self {
            adapters,
            health: RwLock::new(health),
            reference,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            event_bus: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Probe one source and record the outcome
    ///
    /// Returns whether the source is online. Unknown ids return false and
    /// change nothing.
    pub async fn probe(&self, source_id: &str) -> bool {
        let Some(adapter) = self.adapters.iter().find(|a| a.id() == source_id) else {
            debug!(source_id, "Probe requested for unknown source");
            return false;
        };

        let started = Instant::now();
        let online = matches!(
            tokio::time::timeout(self.timeout, adapter.probe(&self.reference)).await,
            Ok(true)
        );
        let response_time_ms = if online {
            duration_to_millis(started.elapsed())
        } else {
            0
        };

        self.record(source_id, online, response_time_ms).await;
        online
    }

    /// Probe every source concurrently
    pub async fn refresh_all(&self) {
        let probes = self.adapters.iter().map(|adapter| self.probe(adapter.id()));
        let results = join_all(probes).await;

        let online = results.iter().filter(|ok| **ok).count();
        debug!(online, total = results.len(), "Health refresh complete");
    }

    /// Snapshot copy of every record, in registration order
    pub async fn status(&self) -> Vec<SourceHealth> {
        self.health.read().await.clone()
    }

    /// Last known status of one source; unknown ids count as online
    pub async fn is_online(&self, source_id: &str) -> bool {
        self.health
            .read()
            .await
            .iter()
            .find(|h| h.source_id == source_id)
            .map_or(true, |h| h.is_online)
    }

    async fn record(&self, source_id: &str, online: bool, response_time_ms: u64) {
        let flipped = {
            let mut health = self.health.write().await;
            let Some(entry) = health.iter_mut().find(|h| h.source_id == source_id) else {
                return;
            };
            let flipped = entry.is_online != online;
            entry.is_online = online;
            entry.last_checked_at = Utc::now();
            entry.last_response_time_ms = response_time_ms;
            flipped
        };

        if flipped {
            info!(source_id, online, response_time_ms, "Source health changed");
            if let Some(bus) = &self.event_bus {
                bus.emit_lossy(LookupEvent::SourceHealthChanged {
                    source_id: source_id.to_string(),
                    is_online: online,
                    response_time_ms,
                    timestamp: Utc::now(),
                });
            }
        }
    }
}
