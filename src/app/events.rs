//! Outbound beacon events.
//!
//! The [`BeaconService`](super::service::BeaconService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::beacon::AttributeId;
use crate::error::{AttError, Error, RadioError};

/// Structured events emitted by the beacon core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeaconEvent {
    /// Boot finished; `restored` is false when defaults were installed.
    Started { restored: bool },

    /// Lock state changed through the Lock or Unlock attribute.
    LockChanged { locked: bool },

    /// An attribute write was applied.
    AttributeWritten(AttributeId),

    /// An attribute access was refused; the store is unchanged.
    AccessRejected { attr: AttributeId, error: AttError },

    /// The calibration tables were applied to the radio.
    TxPowerApplied { mode: u8, declared_dbm: i8, radio_level: u8 },

    /// The record was written to persistent storage.
    Flushed { offset: u16 },

    /// Persisting the record failed; it stays dirty.
    FlushFailed(Error),

    /// Broadcasting (re)started at the given period.
    BroadcastStarted { period_ms: u16 },

    /// An active broadcast stopped because the period is zero.
    BroadcastStopped,

    /// Fragmenting bug or refresh timer failure; broadcasting has been
    /// stopped.
    RadioFault(RadioError),
}
