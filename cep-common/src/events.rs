//! Event types and event bus
//!
//! Services publish lifecycle notifications on an `EventBus`; a UI or CLI
//! subscribes to render them. Publishing never blocks and never fails the
//! publisher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Batch job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Created, not yet started
    Pending,
    /// Processing chunks
    Running,
    /// Waiting between chunks until resumed or cancelled
    Paused,
    /// Every item processed
    Completed,
    /// Stopped by the caller
    Cancelled,
}

impl JobState {
    /// Whether the job can no longer change state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled)
    }
}

/// Progress snapshot emitted after every batch chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Items with a result row so far
    pub processed: usize,

    /// Items submitted
    pub total: usize,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,

    /// Rows with status `Encontrado`
    pub success_count: usize,

    /// Rows with any other status
    pub error_count: usize,

    /// Elapsed time since the job started
    pub elapsed_ms: u64,

    /// `remaining * (elapsed / processed)`, None until something is processed
    pub estimated_remaining_ms: Option<u64>,
}

impl BatchProgress {
    /// Build a snapshot from running counters
    pub fn snapshot(
        processed: usize,
        total: usize,
        success_count: usize,
        error_count: usize,
        elapsed_ms: u64,
    ) -> Self {
        let percentage = if total > 0 {
            (processed as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let estimated_remaining_ms = if processed > 0 {
            let per_item = elapsed_ms as f64 / processed as f64;
            Some((total.saturating_sub(processed) as f64 * per_item) as u64)
        } else {
            None
        };

        Self {
            processed,
            total,
            percentage,
            success_count,
            error_count,
            elapsed_ms,
            estimated_remaining_ms,
        }
    }
}

/// Events published by the resolution services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LookupEvent {
    /// A health probe flipped a source between online and offline
    SourceHealthChanged {
        source_id: String,
        is_online: bool,
        response_time_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Batch job state transition
    BatchStateChanged {
        job_id: Uuid,
        old_state: JobState,
        new_state: JobState,
        timestamp: DateTime<Utc>,
    },

    /// Batch chunk completed
    BatchProgress {
        job_id: Uuid,
        progress: BatchProgress,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution bus
///
/// Uses `tokio::sync::broadcast` internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use cep_common::events::{EventBus, LookupEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(LookupEvent::SourceHealthChanged {
///     source_id: "viacep".to_string(),
///     is_online: false,
///     response_time_ms: 0,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LookupEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<LookupEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: LookupEvent,
    ) -> Result<usize, broadcast::error::SendError<LookupEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LookupEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
