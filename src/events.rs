//! Callback-to-main-loop event queue.
//!
//! Events are produced by:
//! - the esp_timer task (refresh timer expiry)
//! - the Bluedroid task (attribute requests, disconnect, bonding)
//!
//! and consumed by the main loop, which owns the
//! [`BeaconService`](crate::app::service::BeaconService) and handles them
//! one at a time, so the beacon state never needs a lock.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ esp_timer   │────▶│  EVENTS      │────▶│  Main Loop   │
//! │ Bluedroid   │────▶│  (Channel)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Both producer tasks push concurrently, so the queue is a bounded
//! multi-producer [`Channel`] guarded by a critical section, the same
//! primitive the GATT request queue uses.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::ports::TimerHandle;

/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A refresh timer expired.
    RefreshTimer(TimerHandle),
    /// An attribute request is waiting in the GATT request channel.
    AttRequest,
    /// The configuring peer disconnected.
    PeerDisconnected,
    /// Bonding information changed.
    BondingChanged,
}

// ── Multi-producer event channel ──────────────────────────────
//
// Callbacks send (produce), the main loop receives (consume).  Neither side
// ever blocks: a full channel drops the new event.

static EVENTS: Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP> = Channel::new();

/// Push an event into the queue.
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    EVENTS.try_send(event).is_ok()
}

/// Pop the next event from the queue.
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    EVENTS.try_receive().ok()
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Check if the event queue is empty.
pub fn queue_is_empty() -> bool {
    EVENTS.is_empty()
}
