//! Batch resolution
//!
//! Items are split into fixed-size chunks processed strictly one after the
//! other. Inside a chunk, items resolve concurrently through ordered fallback,
//! capped by the concurrency limit, and rows come back in input order.
//!
//! Between chunks the job checks cancellation, waits while paused, publishes
//! a progress snapshot, then throttles before the next chunk. Cancellation is
//! cooperative: calls already in flight finish, but a chunk that completes
//! after the token fired is discarded.
//!
//! # Job states
//! ```text
//! Pending → Running ⇄ Paused
//!              ↓         ↓
//!      Completed     Cancelled
//! ```

use super::single_lookup::{SingleLookupResolver, SYSTEM_SOURCE};
use crate::error::ResolveError;
use crate::types::{LookupStatus, PostalCode};
use cep_common::events::{BatchProgress, EventBus, JobState, LookupEvent};
use cep_common::time::duration_to_millis;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// Error text for address-only items
pub const ADDRESS_ONLY_UNSUPPORTED: &str = "address-based batch search unsupported";

// ============================================================================
// Items and rows
// ============================================================================

/// One submitted batch entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchItem {
    /// Postal code as typed by the user (normalized during resolution)
    PostalCode {
        code: String,
        #[serde(default)]
        origin: Option<String>,
    },
    /// Row that carried only an address description
    AddressOnly {
        description: String,
        #[serde(default)]
        origin: Option<String>,
    },
}

impl BatchItem {
    pub fn postal_code(code: impl Into<String>) -> Self {
        BatchItem::PostalCode {
            code: code.into(),
            origin: None,
        }
    }

    pub fn address_only(description: impl Into<String>) -> Self {
        BatchItem::AddressOnly {
            description: description.into(),
            origin: None,
        }
    }

    /// Attach an origin tag (file name, sheet, row reference)
    pub fn with_origin(mut self, tag: impl Into<String>) -> Self {
        match &mut self {
            BatchItem::PostalCode { origin, .. } | BatchItem::AddressOnly { origin, .. } => {
                *origin = Some(tag.into());
            }
        }
        self
    }

    /// Raw input text
    pub fn input(&self) -> &str {
        match self {
            BatchItem::PostalCode { code, .. } => code,
            BatchItem::AddressOnly { description, .. } => description,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            BatchItem::PostalCode { origin, .. } | BatchItem::AddressOnly { origin, .. } => {
                origin.as_deref()
            }
        }
    }
}

/// One output row; every processed item yields exactly one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub input: String,
    /// Record code on success, normalized input otherwise
    pub postal_code: String,
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub state_code: String,
    pub status: LookupStatus,
    pub source: String,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl BatchResult {
    fn unresolved(
        item: &BatchItem,
        postal_code: String,
        status: LookupStatus,
        error: String,
        response_time_ms: u64,
    ) -> Self {
        Self {
            input: item.input().to_string(),
            postal_code,
            street: String::new(),
            neighborhood: String::new(),
            city: String::new(),
            state_code: String::new(),
            status,
            source: SYSTEM_SOURCE.to_string(),
            response_time_ms,
            error: Some(error),
            origin: item.origin().map(str::to_string),
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == LookupStatus::Found
    }
}

// ============================================================================
// Settings and control handle
// ============================================================================

#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Items per sequential chunk
    pub chunk_size: usize,
    /// Concurrent resolutions inside a chunk
    pub concurrency_limit: usize,
    /// Pause between chunks
    pub throttle: Duration,
    /// Probe every source once before the first chunk
    pub refresh_health: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            chunk_size: 5,
            concurrency_limit: 5,
            throttle: Duration::from_millis(200),
            refresh_health: true,
        }
    }
}

/// Handle to a batch job: pause, resume, cancel, observe
///
/// Cloneable; every clone drives the same job.
#[derive(Clone)]
pub struct BatchControl {
    job_id: Uuid,
    state_tx: Arc<watch::Sender<JobState>>,
    state_rx: watch::Receiver<JobState>,
    token: CancellationToken,
    event_bus: Option<EventBus>,
}

impl BatchControl {
    /// New job in `Pending` with its own cancellation token
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// New job driven by a caller-owned cancellation token
    pub fn with_token(token: CancellationToken) -> Self {
        let (state_tx, state_rx) = watch::channel(JobState::Pending);
        Self {
            job_id: Uuid::new_v4(),
            state_tx: Arc::new(state_tx),
            state_rx,
            token,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn state(&self) -> JobState {
        *self.state_rx.borrow()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state_tx.subscribe()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Hold the job at the next chunk boundary; false if not pausable
    pub fn pause(&self) -> bool {
        self.transition(
            |s| matches!(s, JobState::Pending | JobState::Running),
            JobState::Paused,
        )
    }

    /// Continue a paused job; false if it was not paused
    pub fn resume(&self) -> bool {
        self.transition(|s| s == JobState::Paused, JobState::Running)
    }

    /// Stop at the next chunk boundary and fire the token
    pub fn cancel(&self) -> bool {
        let changed = self.transition(|s| !s.is_terminal(), JobState::Cancelled);
        self.token.cancel();
        changed
    }

    fn transition(&self, allowed: impl Fn(JobState) -> bool, new_state: JobState) -> bool {
        let mut old_state = None;
        self.state_tx.send_if_modified(|state| {
            if *state != new_state && allowed(*state) {
                old_state = Some(*state);
                *state = new_state;
                true
            } else {
                false
            }
        });

        let Some(old_state) = old_state else {
            return false;
        };

        info!(
            job_id = %self.job_id,
            old_state = ?old_state,
            new_state = ?new_state,
            "Batch state changed"
        );
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(LookupEvent::BatchStateChanged {
                job_id: self.job_id,
                old_state,
                new_state,
                timestamp: Utc::now(),
            });
        }
        true
    }

    /// Block while paused; false once cancelled
    async fn wait_while_paused(&self) -> bool {
        let mut rx = self.subscribe();
        loop {
            if self.token.is_cancelled() {
                return false;
            }
            if *rx.borrow_and_update() != JobState::Paused {
                return true;
            }

            debug!(job_id = %self.job_id, "Batch paused, waiting");
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return !self.token.is_cancelled();
                    }
                }
                _ = self.token.cancelled() => return false,
            }
        }
    }
}

impl Default for BatchControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Final state of a run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub job_id: Uuid,
    pub state: JobState,
    pub results: Vec<BatchResult>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn is_cancelled(&self) -> bool {
        self.state == JobState::Cancelled
    }

    /// Rows of a completed run, `Cancelled` otherwise
    pub fn into_complete(self) -> Result<Vec<BatchResult>, ResolveError> {
        if self.is_cancelled() {
            Err(ResolveError::Cancelled)
        } else {
            Ok(self.results)
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub struct BatchResolver {
    resolver: Arc<SingleLookupResolver>,
    settings: BatchSettings,
    event_bus: Option<EventBus>,
}

impl BatchResolver {
    pub fn new(resolver: Arc<SingleLookupResolver>, settings: BatchSettings) -> Self {
        Self {
            resolver,
            settings,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Control handle for a new job, wired to this resolver's event bus
    pub fn new_job(&self) -> BatchControl {
        let control = BatchControl::new();
        match &self.event_bus {
            Some(bus) => control.with_event_bus(bus.clone()),
            None => control,
        }
    }

    /// Resolve every item, one chunk at a time
    ///
    /// Returns one row per processed item, in input order. A cancelled run
    /// returns the rows of every chunk that finished before cancellation.
    pub async fn run<F>(
        &self,
        items: &[BatchItem],
        concurrency_limit: usize,
        control: &BatchControl,
        mut on_progress: F,
    ) -> BatchReport
    where
        F: FnMut(BatchProgress) + Send,
    {
        let started = Instant::now();
        let total = items.len();
        let chunk_size = self.settings.chunk_size.max(1);
        let concurrency_limit = concurrency_limit.max(1);
        let job_id = control.job_id();

        control.transition(|s| s == JobState::Pending, JobState::Running);
        info!(
            job_id = %job_id,
            total,
            chunk_size,
            concurrency_limit,
            "Batch started"
        );

        if self.settings.refresh_health && !items.is_empty() {
            self.resolver.health().refresh_all().await;
        }

        let mut results: Vec<BatchResult> = Vec::with_capacity(total);
        let mut success_count = 0;
        let chunk_count = total.div_ceil(chunk_size);

        for (index, chunk) in items.chunks(chunk_size).enumerate() {
            if control.is_cancelled() || !control.wait_while_paused().await {
                break;
            }

            let lookups: Vec<_> = chunk
                .iter()
                .cloned()
                .map(|item| {
                    let resolver = Arc::clone(&self.resolver);
                    async move { resolve_item(&resolver, &item).await }
                })
                .collect();
            let rows: Vec<BatchResult> = stream::iter(lookups)
                .buffered(concurrency_limit)
                .collect()
                .await;

            if control.is_cancelled() {
                debug!(job_id = %job_id, chunk = index, "Discarding chunk finished after cancellation");
                break;
            }

            success_count += rows.iter().filter(|r| r.is_found()).count();
            results.extend(rows);

            let progress = BatchProgress::snapshot(
                results.len(),
                total,
                success_count,
                results.len() - success_count,
                duration_to_millis(started.elapsed()),
            );
            debug!(
                job_id = %job_id,
                processed = progress.processed,
                total,
                "Batch chunk complete"
            );
            if let Some(bus) = &self.event_bus {
                bus.emit_lossy(LookupEvent::BatchProgress {
                    job_id,
                    progress: progress.clone(),
                    timestamp: Utc::now(),
                });
            }
            on_progress(progress);

            // A pause requested mid-chunk holds here, including after the last chunk
            if !control.wait_while_paused().await {
                break;
            }

            if index + 1 < chunk_count {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.throttle) => {}
                    _ = control.token().cancelled() => {}
                }
            }
        }

        let state = if control.is_cancelled() {
            control.transition(|s| !s.is_terminal(), JobState::Cancelled);
            JobState::Cancelled
        } else {
            control.transition(|s| !s.is_terminal(), JobState::Completed);
            JobState::Completed
        };

        let elapsed_ms = duration_to_millis(started.elapsed());
        info!(
            job_id = %job_id,
            processed = results.len(),
            total,
            found = success_count,
            elapsed_ms,
            state = ?state,
            "Batch finished"
        );

        BatchReport {
            job_id,
            state,
            results,
            elapsed_ms,
        }
    }
}

/// Resolve one item into its row; never fails
async fn resolve_item(resolver: &SingleLookupResolver, item: &BatchItem) -> BatchResult {
    let started = Instant::now();

    let code = match item {
        BatchItem::AddressOnly { .. } => {
            return BatchResult::unresolved(
                item,
                String::new(),
                LookupStatus::Error,
                ADDRESS_ONLY_UNSUPPORTED.to_string(),
                0,
            );
        }
        BatchItem::PostalCode { code, .. } => code,
    };

    // A malformed code is a miss, not an error; no source is queried
    let cep = match PostalCode::parse(code) {
        Ok(cep) => cep,
        Err(e) => {
            return BatchResult::unresolved(
                item,
                code.clone(),
                LookupStatus::NotFound,
                e.to_string(),
                0,
            );
        }
    };

    let outcome = resolver.resolve_ordered(&cep).await;
    let response_time_ms = duration_to_millis(started.elapsed());

    match outcome {
        Ok(address) => BatchResult {
            input: code.clone(),
            postal_code: address.postal_code.to_string(),
            street: address.street,
            neighborhood: address.neighborhood,
            city: address.city,
            state_code: address.state_code,
            status: LookupStatus::Found,
            source: address.source_name,
            response_time_ms,
            error: None,
            origin: item.origin().map(str::to_string),
        },
        Err(e) => BatchResult::unresolved(
            item,
            cep.to_string(),
            LookupStatus::NotFound,
            e.to_string(),
            response_time_ms,
        ),
    }
}
