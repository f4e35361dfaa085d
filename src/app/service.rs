//! Beacon service: the hexagonal core.
//!
//! [`BeaconService`] owns the configuration store and the refresh
//! scheduler.  All I/O flows through port traits injected at call sites,
//! making the entire service testable with mock adapters.
//!
//! ```text
//!  BeaconCommand ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                    │     BeaconService      │
//!   timer expiry ──▶ │  ConfigStore · Sched.  │ ──▶ RadioPort / TimerPort
//!                    └────────────────────────┘ ◀─▶ PersistencePort
//! ```

use log::{error, info, warn};

use crate::beacon::store::AttrValue;
use crate::beacon::{AttributeId, ConfigStore};
use crate::config::{BeaconDefaults, PlatformConfig};
use crate::error::{AttError, Error, RadioError, RecordError, StorageError};
use crate::scheduler::RefreshScheduler;

use super::commands::BeaconCommand;
use super::events::BeaconEvent;
use super::ports::{EventSink, PersistencePort, RadioPort, SensorPort, TimerHandle, TimerPort};

// ───────────────────────────────────────────────────────────────
// BeaconService
// ───────────────────────────────────────────────────────────────

/// The beacon service orchestrates all domain logic.
pub struct BeaconService {
    store: ConfigStore,
    scheduler: RefreshScheduler,
    nvm_offset: u16,
}

impl BeaconService {
    /// Construct the service.  Does **not** touch storage or the radio;
    /// call [`boot`](Self::boot) next.
    pub fn new(defaults: BeaconDefaults, platform: PlatformConfig) -> Self {
        let nvm_offset = platform.nvm_base_offset;
        Self {
            store: ConfigStore::new(defaults, nvm_offset),
            scheduler: RefreshScheduler::new(platform),
            nvm_offset,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore the record (or install defaults), apply the TX power mode
    /// and start broadcasting.
    pub fn boot(
        &mut self,
        hw: &mut (impl RadioPort + TimerPort + SensorPort),
        nvm: &mut impl PersistencePort,
        sink: &mut impl EventSink,
    ) {
        let restored = match self.store.restore(nvm, self.nvm_offset) {
            Ok(_) => {
                info!("BeaconService: record restored");
                true
            }
            Err(Error::Record(RecordError::BadMagic) | Error::Storage(StorageError::NotFound)) => {
                info!("BeaconService: no stored record, installing defaults");
                self.store.reset();
                false
            }
            Err(e) => {
                warn!("BeaconService: stored record unusable ({}), installing defaults", e);
                self.store.reset();
                false
            }
        };
        self.apply_tx_power(hw, sink);
        self.flush(nvm, sink);
        sink.emit(&BeaconEvent::Started { restored });
        self.resume_broadcast(hw, sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one request from the attribute transport or link layer.
    ///
    /// Reads return the attribute value; writes and link notifications
    /// return an empty value on success.
    pub fn handle_command(
        &mut self,
        cmd: BeaconCommand,
        hw: &mut (impl RadioPort + TimerPort + SensorPort),
        nvm: &mut impl PersistencePort,
        sink: &mut impl EventSink,
    ) -> Result<AttrValue, AttError> {
        match cmd {
            BeaconCommand::Read(attr) => self.store.read(attr).inspect_err(|&error| {
                sink.emit(&BeaconEvent::AccessRejected { attr, error });
            }),
            BeaconCommand::Write { attr, value } => {
                if let Err(error) = self.store.write(attr, &value) {
                    sink.emit(&BeaconEvent::AccessRejected { attr, error });
                    return Err(error);
                }
                match attr {
                    AttributeId::Lock | AttributeId::Unlock => sink.emit(&BeaconEvent::LockChanged {
                        locked: self.store.is_locked(),
                    }),
                    _ => sink.emit(&BeaconEvent::AttributeWritten(attr)),
                }
                if attr == AttributeId::Reset {
                    self.apply_tx_power(hw, sink);
                }
                self.flush(nvm, sink);
                Ok(AttrValue::new())
            }
            BeaconCommand::Disconnected => {
                info!("BeaconService: peer disconnected");
                self.apply_tx_power(hw, sink);
                self.flush(nvm, sink);
                self.resume_broadcast(hw, sink);
                Ok(AttrValue::new())
            }
            BeaconCommand::BondingChanged => {
                self.flush(nvm, sink);
                Ok(AttrValue::new())
            }
        }
    }

    /// Timer expiry from the event loop.
    pub fn on_timer_expired(
        &mut self,
        handle: TimerHandle,
        hw: &mut (impl RadioPort + TimerPort + SensorPort),
        sink: &mut impl EventSink,
    ) {
        if self.store.period() == 0 {
            if self.scheduler.is_armed(handle) {
                self.stop_broadcast(hw, sink);
            }
            return;
        }
        if let Err(e) = self.scheduler.on_timer(handle, &mut self.store, hw) {
            self.radio_fault(e, hw, sink);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    // ── Internal ──────────────────────────────────────────────

    /// Start broadcasting at the stored period, or stop when it is zero.
    fn resume_broadcast(
        &mut self,
        hw: &mut (impl RadioPort + TimerPort + SensorPort),
        sink: &mut impl EventSink,
    ) {
        let period_ms = self.store.period();
        if period_ms == 0 {
            self.stop_broadcast(hw, sink);
            return;
        }
        match self.scheduler.start(&mut self.store, hw) {
            Ok(()) => sink.emit(&BeaconEvent::BroadcastStarted { period_ms }),
            Err(e) => self.radio_fault(e, hw, sink),
        }
    }

    /// Stop an active broadcast.  Nothing is reported when already idle.
    fn stop_broadcast(
        &mut self,
        hw: &mut (impl RadioPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        if self.scheduler.is_broadcasting() {
            self.scheduler.stop(hw);
            sink.emit(&BeaconEvent::BroadcastStopped);
        }
    }

    fn apply_tx_power(&mut self, hw: &mut impl RadioPort, sink: &mut impl EventSink) {
        if let Err(e) = self.store.apply_tx_power_mode(hw) {
            warn!("BeaconService: TX power not applied: {}", e);
            return;
        }
        let r = self.store.record();
        let mode = r.tx_power_mode;
        sink.emit(&BeaconEvent::TxPowerApplied {
            mode,
            declared_dbm: self.store.declared_tx_power(),
            radio_level: r.radio_tx_power_levels[usize::from(mode)],
        });
    }

    /// Persist if dirty.  A failure leaves the store dirty so the next
    /// opportunity retries.
    fn flush(&mut self, nvm: &mut impl PersistencePort, sink: &mut impl EventSink) {
        if !self.store.is_dirty() {
            return;
        }
        match self.store.flush_remembered(nvm) {
            Ok(_) => sink.emit(&BeaconEvent::Flushed {
                offset: self.nvm_offset,
            }),
            Err(e) => {
                warn!("BeaconService: flush failed: {}", e);
                sink.emit(&BeaconEvent::FlushFailed(e));
            }
        }
    }

    fn radio_fault(
        &mut self,
        e: RadioError,
        hw: &mut (impl RadioPort + TimerPort),
        sink: &mut impl EventSink,
    ) {
        error!("BeaconService: broadcast stopped ({})", e);
        self.scheduler.stop(hw);
        sink.emit(&BeaconEvent::RadioFault(e));
    }
}
