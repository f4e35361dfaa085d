//! The durable beacon record and its fixed-size persisted slot.
//!
//! Slot layout (`RECORD_SLOT_SIZE` bytes):
//!
//! ```text
//! [0]    magic   0xEB
//! [1]    version 1
//! [2..]  postcard(BeaconRecord), zero padded
//! ```
//!
//! A blank or foreign slot fails with [`RecordError::BadMagic`] so the caller
//! can fall back to defaults; a slot with our header that does not decode
//! or violates a record invariant is [`RecordError::Corrupted`].

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::config::{
    BeaconDefaults, BEACON_DATA_MAX, LOCK_CODE_SIZE, PERIOD_MIN_MS, RECORD_SLOT_SIZE,
    TX_POWER_LEVELS, URI_MAX,
};
use crate::error::RecordError;

const SLOT_MAGIC: u8 = 0xEB;
const SLOT_VERSION: u8 = 1;
const SLOT_HEADER_LEN: usize = 2;

/// Everything the beacon persists across power cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconRecord {
    pub name: Vec<u8, BEACON_DATA_MAX>,
    pub uri: Vec<u8, URI_MAX>,
    pub flags: u8,
    /// Declared power byte looked up from `adv_tx_power_levels`.
    pub tx_power: u8,
    pub lock_state: bool,
    pub lock_code: [u8; LOCK_CODE_SIZE],
    pub tx_power_mode: u8,
    pub adv_tx_power_levels: [u8; TX_POWER_LEVELS],
    pub radio_tx_power_levels: [u8; TX_POWER_LEVELS],
    /// Broadcast period in milliseconds, `0` disables broadcasting.
    pub period: u16,
    pub packet_counter: u32,
}

impl BeaconRecord {
    pub fn from_defaults(defaults: &BeaconDefaults) -> Self {
        let mode = usize::from(defaults.tx_power_mode).min(TX_POWER_LEVELS - 1);
        Self {
            name: defaults.name.clone(),
            uri: defaults.uri.clone(),
            flags: defaults.flags,
            tx_power: defaults.adv_tx_power_levels[mode],
            lock_state: false,
            lock_code: [0; LOCK_CODE_SIZE],
            tx_power_mode: mode as u8,
            adv_tx_power_levels: defaults.adv_tx_power_levels,
            radio_tx_power_levels: defaults.radio_tx_power_levels,
            period: defaults.period_ms,
            packet_counter: 0,
        }
    }

    /// Check the invariants a restored record must satisfy.
    pub fn is_valid(&self) -> bool {
        usize::from(self.tx_power_mode) < TX_POWER_LEVELS
            && (self.period == 0 || self.period >= PERIOD_MIN_MS)
    }

    /// Serialise into a full, zero-padded slot.
    pub fn encode_slot(&self) -> Result<[u8; RECORD_SLOT_SIZE], RecordError> {
        let mut slot = [0u8; RECORD_SLOT_SIZE];
        slot[0] = SLOT_MAGIC;
        slot[1] = SLOT_VERSION;
        postcard::to_slice(self, &mut slot[SLOT_HEADER_LEN..]).map_err(|_| RecordError::Encode)?;
        Ok(slot)
    }

    /// Parse a slot previously produced by [`encode_slot`](Self::encode_slot).
    pub fn decode_slot(slot: &[u8]) -> Result<Self, RecordError> {
        if slot.len() < SLOT_HEADER_LEN || slot[0] != SLOT_MAGIC {
            return Err(RecordError::BadMagic);
        }
        if slot[1] != SLOT_VERSION {
            return Err(RecordError::Corrupted);
        }
        let record: Self =
            postcard::from_bytes(&slot[SLOT_HEADER_LEN..]).map_err(|_| RecordError::Corrupted)?;
        if !record.is_valid() {
            return Err(RecordError::Corrupted);
        }
        Ok(record)
    }
}

impl Default for BeaconRecord {
    fn default() -> Self {
        Self::from_defaults(&BeaconDefaults::default())
    }
}
