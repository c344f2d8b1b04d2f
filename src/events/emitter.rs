//! # Non-blocking event emitter.
//!
//! [`Emitter`] is a thin wrapper around a bounded [`tokio::sync::mpsc`] queue that
//! decouples the runner (producer) from the host (consumer).
//!
//! ## Architecture
//! ```text
//! Producers:                               Consumer (one):
//!   Runner ────────┐
//!   TaskLogger ────┼──► Emitter ──► [bounded queue] ──► Task::wait_for_next_event
//!   progress cb ───┘   (try_send)
//! ```
//!
//! ## Rules
//! - **Non-blocking emit**: `emit()` never waits; it calls `mpsc::Sender::try_send`.
//! - **Drop on full**: when the queue is full the *new* event is discarded and counted.
//! - **FIFO**: whatever is retained is delivered in emission order.
//! - **No delivery guarantee**: progress and log events are best-effort; terminal
//!   events rely on the queue's slack capacity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use super::event::{Event, EventKey};

/// Drop-on-full event sink.
///
/// ### Properties
/// - **Non-blocking**: `emit()` returns immediately.
/// - **Lossy**: overflow drops the event and bumps [`dropped`](Self::dropped).
/// - **Cloneable**: clones share the same queue and drop counter.
#[derive(Clone, Debug)]
pub struct Emitter {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl Emitter {
    /// Creates an emitter and the receiving end of its queue.
    ///
    /// The minimum capacity is 1 (clamped).
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Emits an event without blocking.
    ///
    /// - On queue full: the event is dropped and counted.
    /// - On queue closed (receiver gone): the event is silently discarded.
    pub fn emit(&self, ev: Event) {
        match self.tx.try_send(ev) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(ev)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %ev.key, "event queue full; event dropped");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Emits an event with an empty payload.
    #[inline]
    pub fn emit_empty(&self, key: EventKey) {
        self.emit(Event::empty(key));
    }

    /// Emits a `failure.*` event.
    #[inline]
    pub fn emit_failure(&self, key: EventKey, failure: impl Into<String>) {
        self.emit(Event::failure(key, failure));
    }

    /// Emits `failure.startup`.
    #[inline]
    pub fn emit_failure_startup(&self, failure: impl Into<String>) {
        self.emit_failure(EventKey::FailureStartup, failure);
    }

    /// Emits `status.progress`.
    #[inline]
    pub fn emit_progress(&self, percentage: f64, message: impl Into<String>) {
        self.emit(Event::progress(percentage, message));
    }

    /// Returns how many events were discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_queue_drops_newest() {
        let (em, mut rx) = Emitter::channel(2);
        em.emit_empty(EventKey::StatusQueued);
        em.emit_empty(EventKey::StatusStarted);
        em.emit_progress(0.1, "dropped");

        assert_eq!(em.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap().key, EventKey::StatusQueued);
        assert_eq!(rx.try_recv().unwrap().key, EventKey::StatusStarted);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue_does_not_count_as_drop() {
        let (em, rx) = Emitter::channel(4);
        drop(rx);
        em.emit_failure_startup("nobody listens");
        assert_eq!(em.dropped(), 0);
    }

    #[test]
    fn test_clones_share_queue() {
        let (em, mut rx) = Emitter::channel(1);
        let other = em.clone();
        em.emit_empty(EventKey::StatusQueued);
        other.emit_empty(EventKey::StatusStarted);
        assert_eq!(em.dropped(), 1);
        assert_eq!(other.dropped(), 1);
        assert_eq!(rx.try_recv().unwrap().key, EventKey::StatusQueued);
    }
}
