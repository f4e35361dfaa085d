//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured beacon events to the
//! ESP-IDF logger (which goes to UART / USB-CDC in production).  Lock codes
//! never reach this adapter; events only carry the lock state.

use log::{error, info, warn};

use crate::app::events::BeaconEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`BeaconEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &BeaconEvent) {
        match event {
            BeaconEvent::Started { restored } => {
                info!(
                    "START | record={}",
                    if *restored { "restored" } else { "defaults" }
                );
            }
            BeaconEvent::LockChanged { locked } => {
                info!("LOCK | {}", if *locked { "locked" } else { "unlocked" });
            }
            BeaconEvent::AttributeWritten(attr) => {
                info!("ATT | write {:?} ok", attr);
            }
            BeaconEvent::AccessRejected { attr, error } => {
                warn!(
                    "ATT | {:?} refused: {} (0x{:02X})",
                    attr,
                    error,
                    error.att_status()
                );
            }
            BeaconEvent::TxPowerApplied {
                mode,
                declared_dbm,
                radio_level,
            } => {
                info!(
                    "TX | mode={} declared={}dBm radio_level={}",
                    mode, declared_dbm, radio_level
                );
            }
            BeaconEvent::Flushed { offset } => {
                info!("NVM | record flushed at offset {}", offset);
            }
            BeaconEvent::FlushFailed(e) => {
                warn!("NVM | flush failed: {} (record stays dirty)", e);
            }
            BeaconEvent::BroadcastStarted { period_ms } => {
                info!("ADV | broadcasting, period={}ms", period_ms);
            }
            BeaconEvent::BroadcastStopped => {
                info!("ADV | stopped (period=0)");
            }
            BeaconEvent::RadioFault(e) => {
                error!("ADV | fault: {}, broadcast halted", e);
            }
        }
    }
}
