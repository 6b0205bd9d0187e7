//! Event types for the reelshelf event system
//!
//! Provides shared event definitions and the EventBus used by resolver
//! hosts to report poster load progress to interested pages.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// reelshelf event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReelEvent {
    /// A poster candidate loaded successfully
    PosterResolved {
        /// Resolver instance that produced the event
        resolver_id: Uuid,
        /// URL as supplied by the caller
        original_url: Option<String>,
        /// Candidate that loaded
        resolved_url: String,
        /// Fallback transforms consumed before success
        retry_index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A candidate failed and the next fallback was scheduled
    PosterRetrying {
        resolver_id: Uuid,
        original_url: Option<String>,
        /// Candidate that failed
        failed_url: String,
        /// Next candidate to try
        next_url: String,
        /// Name of the fallback transform that produced `next_url`
        transform: String,
        /// Retry index after advancing (1-based attempt count of fallbacks)
        retry_index: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Every fallback failed; placeholder is displayed with an error indicator
    PosterExhausted {
        resolver_id: Uuid,
        original_url: Option<String>,
        /// Fallbacks tried before giving up
        retries: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Normalized URL was already known to load; spinner suppressed
    PosterCacheHit {
        resolver_id: Uuid,
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Caller supplied a URL that does not parse; placeholder substituted
    InvalidPosterUrl {
        raw_url: String,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ReelEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            ReelEvent::PosterResolved { .. } => "PosterResolved",
            ReelEvent::PosterRetrying { .. } => "PosterRetrying",
            ReelEvent::PosterExhausted { .. } => "PosterExhausted",
            ReelEvent::PosterCacheHit { .. } => "PosterCacheHit",
            ReelEvent::InvalidPosterUrl { .. } => "InvalidPosterUrl",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally: publishing never blocks, slow
/// subscribers observe `Lagged` instead of stalling producers.
///
/// # Examples
///
/// ```
/// use reel_common::events::{EventBus, ReelEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(ReelEvent::InvalidPosterUrl {
///     raw_url: "not a url".to_string(),
///     reason: "relative URL without a base".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "InvalidPosterUrl");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReelEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ReelEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ReelEvent,
    ) -> Result<usize, broadcast::error::SendError<ReelEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ReelEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
