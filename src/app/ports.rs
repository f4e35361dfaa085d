//! Port traits: the hexagonal boundary between the beacon core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BeaconService (domain)
//! ```
//!
//! Driven adapters (radio, timer, sensors, storage, event sinks) implement
//! these traits.  The [`BeaconService`](super::service::BeaconService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! Every port call is synchronous and bounded: it either completes or
//! fails immediately, the core never waits on one.

use core::time::Duration;

use crate::error::{RadioError, StorageError};

// ───────────────────────────────────────────────────────────────
// Persistence port (driven adapter: domain ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Raw access to the persistent image at caller-chosen offsets.
///
/// Offsets and lengths are in bytes.  Offset bookkeeping belongs to the
/// caller; an implementation only checks that the range is in bounds.
pub trait PersistencePort {
    /// Fill `buf` from the image starting at `offset`.
    fn read(&self, offset: u16, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Overwrite the image at `offset` with `data`.  Either the whole
    /// range is committed or the call fails.
    fn write(&mut self, offset: u16, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Live values sampled once per refresh cycle.
pub trait SensorPort {
    /// Remaining battery capacity, 0–100.
    fn battery_percent(&mut self) -> u8;

    /// Temperature in °C as signed 8.8 fixed point.
    fn temperature(&mut self) -> i16;
}

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: domain → advertising stack)
// ───────────────────────────────────────────────────────────────

/// Which advertising data store a fragment is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdTarget {
    Advertise,
    ScanResponse,
}

/// The advertising half of the BLE stack.
pub trait RadioPort {
    /// Non-connectable, non-discoverable broadcaster with no security.
    fn set_broadcaster_role(&mut self) -> Result<(), RadioError>;

    /// Advertising interval, applied by the next
    /// [`start_advertising`](Self::start_advertising).
    fn set_interval(&mut self, interval: Duration) -> Result<(), RadioError>;

    /// Discard any payload previously submitted to `target`.
    fn clear(&mut self, target: AdTarget) -> Result<(), RadioError>;

    /// Append one fragment (whole AD structures only) to `target`.
    fn store_fragment(&mut self, target: AdTarget, fragment: &[u8]) -> Result<(), RadioError>;

    /// Radio transmit level, as an index into the platform power table.
    fn set_tx_power(&mut self, level: u8) -> Result<(), RadioError>;

    fn start_advertising(&mut self) -> Result<(), RadioError>;

    fn stop_advertising(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: domain → one-shot timer)
// ───────────────────────────────────────────────────────────────

/// Opaque token identifying one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub u32);

/// One-shot timer that reports expiry back through the event queue.
pub trait TimerPort {
    /// Arm a timer that fires once after `after`.  Fails with
    /// [`RadioError::TimerUnavailable`] when the timer cannot be started;
    /// nothing is armed then.
    fn arm(&mut self, after: Duration) -> Result<TimerHandle, RadioError>;

    /// Cancel `handle`.  Cancelling an expired or unknown handle is a no-op.
    fn disarm(&mut self, handle: TimerHandle);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`BeaconEvent`](super::events::BeaconEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::BeaconEvent);
}
