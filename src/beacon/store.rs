//! Configuration store: the beacon record plus its access policy.
//!
//! Every write is validated in a fixed order before anything changes:
//!
//! 1. lock gate: a gated attribute while locked → `InsufficientAuthorization`
//! 2. length: wrong size or too long → `InvalidLength`
//! 3. value: TX power mode outside `0..=3` → `WriteNotPermitted`
//! 4. clamp: a period in `1..100` is stored as `100`
//!
//! A refused write leaves the record untouched.  A successful one marks
//! the store dirty; [`flush`](ConfigStore::flush) clears the flag only
//! when the persistence write succeeded.
//!
//! The unlock path has no retry limit or backoff.  A peer in range can try
//! codes indefinitely; this matches the deployed protocol.

use log::{debug, info, warn};

use crate::app::ports::{PersistencePort, RadioPort};
use crate::config::{
    BeaconDefaults, BEACON_DATA_MAX, LOCK_CODE_SIZE, PERIOD_MIN_MS, RECORD_SLOT_SIZE,
    TX_POWER_LEVELS,
};
use crate::error::{AttError, RadioError, Result, StorageError};

use super::attributes::AttributeId;
use super::record::BeaconRecord;

/// Value returned by an attribute read.
pub type AttrValue = heapless::Vec<u8, BEACON_DATA_MAX>;

pub struct ConfigStore {
    record: BeaconRecord,
    defaults: BeaconDefaults,
    dirty: bool,
    /// Offset of the last flush or restore.
    offset: u16,
}

impl ConfigStore {
    /// Fresh store holding `defaults`, to be persisted at `offset`.
    ///
    /// The store starts dirty: nothing has been written yet.
    pub fn new(defaults: BeaconDefaults, offset: u16) -> Self {
        Self {
            record: BeaconRecord::from_defaults(&defaults),
            defaults,
            dirty: true,
            offset,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn record(&self) -> &BeaconRecord {
        &self.record
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_locked(&self) -> bool {
        self.record.lock_state
    }

    pub fn period(&self) -> u16 {
        self.record.period
    }

    /// Declared power byte at the last [`apply_tx_power_mode`](Self::apply_tx_power_mode).
    pub fn declared_tx_power(&self) -> i8 {
        self.record.tx_power as i8
    }

    // ── Attribute access ──────────────────────────────────────

    pub fn read(&self, attr: AttributeId) -> core::result::Result<AttrValue, AttError> {
        if !attr.descriptor().readable {
            return Err(AttError::ReadNotPermitted);
        }
        let r = &self.record;
        match attr {
            AttributeId::LockState => value_of(&[u8::from(r.lock_state)]),
            AttributeId::Name => value_of(&r.name),
            AttributeId::Uri => value_of(&r.uri),
            AttributeId::Flags => value_of(&[r.flags]),
            AttributeId::TxPowerMode => value_of(&[r.tx_power_mode]),
            AttributeId::AdvTxPowerLevels => value_of(&r.adv_tx_power_levels),
            AttributeId::RadioTxPowerLevels => value_of(&r.radio_tx_power_levels),
            AttributeId::Period => value_of(&r.period.to_le_bytes()),
            AttributeId::Lock | AttributeId::Unlock | AttributeId::Reset => {
                Err(AttError::ReadNotPermitted)
            }
        }
    }

    pub fn write(&mut self, attr: AttributeId, value: &[u8]) -> core::result::Result<(), AttError> {
        let desc = attr.descriptor();
        if !desc.writable {
            return Err(AttError::WriteNotPermitted);
        }
        match attr {
            AttributeId::Lock => return self.lock(value),
            AttributeId::Unlock => return self.unlock(value),
            _ => {}
        }
        if desc.lock_gated && self.record.lock_state {
            return Err(AttError::InsufficientAuthorization);
        }
        if !desc.size.accepts(value.len()) {
            return Err(AttError::InvalidLength);
        }
        if attr == AttributeId::Reset {
            self.reset();
            return Ok(());
        }

        let r = &mut self.record;
        match attr {
            AttributeId::Name => {
                r.name.clear();
                r.name
                    .extend_from_slice(value)
                    .map_err(|_| AttError::InvalidLength)?;
            }
            AttributeId::Uri => {
                r.uri.clear();
                r.uri
                    .extend_from_slice(value)
                    .map_err(|_| AttError::InvalidLength)?;
            }
            AttributeId::Flags => r.flags = value[0],
            AttributeId::TxPowerMode => {
                if usize::from(value[0]) >= TX_POWER_LEVELS {
                    return Err(AttError::WriteNotPermitted);
                }
                // Radio level follows on the next apply_tx_power_mode().
                r.tx_power_mode = value[0];
            }
            AttributeId::AdvTxPowerLevels => r.adv_tx_power_levels.copy_from_slice(value),
            AttributeId::RadioTxPowerLevels => r.radio_tx_power_levels.copy_from_slice(value),
            AttributeId::Period => {
                r.period = clamp_period(u16::from_le_bytes([value[0], value[1]]));
            }
            AttributeId::LockState
            | AttributeId::Lock
            | AttributeId::Unlock
            | AttributeId::Reset => {
                return Err(AttError::WriteNotPermitted);
            }
        }
        self.dirty = true;
        debug!("ConfigStore: {:?} written ({} bytes)", attr, value.len());
        Ok(())
    }

    /// Store `code` and lock.  Only allowed while unlocked.
    pub fn lock(&mut self, code: &[u8]) -> core::result::Result<(), AttError> {
        if self.record.lock_state {
            return Err(AttError::InsufficientAuthorization);
        }
        let code: [u8; LOCK_CODE_SIZE] = code.try_into().map_err(|_| AttError::InvalidLength)?;
        self.record.lock_code = code;
        self.record.lock_state = true;
        self.dirty = true;
        info!("ConfigStore: locked");
        Ok(())
    }

    /// Clear the lock if `code` matches the stored one.
    pub fn unlock(&mut self, code: &[u8]) -> core::result::Result<(), AttError> {
        if code.len() != LOCK_CODE_SIZE {
            return Err(AttError::InvalidLength);
        }
        if !self.record.lock_state {
            return Err(AttError::WriteNotAllowed);
        }
        if code != self.record.lock_code.as_slice() {
            warn!("ConfigStore: unlock rejected");
            return Err(AttError::InsufficientAuthorization);
        }
        self.record.lock_state = false;
        self.dirty = true;
        info!("ConfigStore: unlocked");
        Ok(())
    }

    /// Restore every field, the packet counter included, to its default.
    pub fn reset(&mut self) {
        self.record = BeaconRecord::from_defaults(&self.defaults);
        self.dirty = true;
        info!("ConfigStore: reset to defaults");
    }

    // ── Live fields ───────────────────────────────────────────

    /// Advance the packet counter for one refresh and return the new value.
    ///
    /// The counter is not a configuration change and does not dirty the
    /// store; it is persisted with the next flush that happens anyway.
    pub fn next_packet_counter(&mut self) -> u32 {
        self.record.packet_counter = self.record.packet_counter.wrapping_add(1);
        self.record.packet_counter
    }

    /// Look up both calibration tables at the current mode: store the
    /// declared byte and set the radio level.
    pub fn apply_tx_power_mode(
        &mut self,
        radio: &mut impl RadioPort,
    ) -> core::result::Result<(), RadioError> {
        let mode = usize::from(self.record.tx_power_mode).min(TX_POWER_LEVELS - 1);
        let declared = self.record.adv_tx_power_levels[mode];
        if declared != self.record.tx_power {
            self.record.tx_power = declared;
            self.dirty = true;
        }
        radio.set_tx_power(self.record.radio_tx_power_levels[mode])?;
        debug!(
            "ConfigStore: tx mode {} -> declared {} dBm, radio level {}",
            mode, declared as i8, self.record.radio_tx_power_levels[mode]
        );
        Ok(())
    }

    // ── Persistence ───────────────────────────────────────────

    /// Write the record at `offset` if dirty.  Returns the offset just past
    /// the record whether or not a write happened.
    pub fn flush(&mut self, nvm: &mut impl PersistencePort, offset: u16) -> Result<u16> {
        self.offset = offset;
        let next = next_offset(offset)?;
        if !self.dirty {
            return Ok(next);
        }
        let slot = self.record.encode_slot()?;
        nvm.write(offset, &slot)?;
        self.dirty = false;
        debug!("ConfigStore: flushed at offset {}", offset);
        Ok(next)
    }

    /// [`flush`](Self::flush) at the offset of the last flush or restore.
    pub fn flush_remembered(&mut self, nvm: &mut impl PersistencePort) -> Result<u16> {
        self.flush(nvm, self.offset)
    }

    /// Load the record stored at `offset`.  On failure the in-memory
    /// record is left as it was.
    pub fn restore(&mut self, nvm: &impl PersistencePort, offset: u16) -> Result<u16> {
        self.offset = offset;
        let next = next_offset(offset)?;
        let mut slot = [0u8; RECORD_SLOT_SIZE];
        nvm.read(offset, &mut slot)?;
        self.record = BeaconRecord::decode_slot(&slot)?;
        self.dirty = false;
        debug!("ConfigStore: restored from offset {}", offset);
        Ok(next)
    }
}

fn value_of(bytes: &[u8]) -> core::result::Result<AttrValue, AttError> {
    AttrValue::from_slice(bytes).map_err(|_| AttError::InvalidLength)
}

fn clamp_period(period: u16) -> u16 {
    match period {
        0 => 0,
        p if p < PERIOD_MIN_MS => PERIOD_MIN_MS,
        p => p,
    }
}

fn next_offset(offset: u16) -> core::result::Result<u16, StorageError> {
    offset
        .checked_add(RECORD_SLOT_SIZE as u16)
        .ok_or(StorageError::OutOfRange)
}
