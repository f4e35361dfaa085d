//! Beacon configuration parameters
//!
//! Compiled-in defaults for the beacon record and the platform limits the
//! advertising path works within.  The defaults are applied at first boot
//! and again whenever a peer writes the Reset attribute.

use serde::{Deserialize, Serialize};

/// Maximum length of the name and of the rendered service-data body.
pub const BEACON_DATA_MAX: usize = 18;
/// Battery (1) + temperature (2) + packet counter (4).
pub const DYNAMIC_FIELDS_SIZE: usize = 7;
/// URI bytes that still leave room for the dynamic fields.
pub const URI_MAX: usize = BEACON_DATA_MAX - DYNAMIC_FIELDS_SIZE;
pub const LOCK_CODE_SIZE: usize = 16;
pub const TX_POWER_LEVELS: usize = 4;
/// Smallest non-zero broadcast period in milliseconds.
pub const PERIOD_MIN_MS: u16 = 100;
/// Bytes reserved in persistent storage for one beacon record.
pub const RECORD_SLOT_SIZE: usize = 96;

/// Record defaults restored on first boot and on reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconDefaults {
    /// Shortened local name broadcast in the scan response.
    pub name: heapless::Vec<u8, BEACON_DATA_MAX>,
    /// Compressed URI: scheme prefix byte followed by the host.
    pub uri: heapless::Vec<u8, URI_MAX>,
    pub flags: u8,
    /// Index into the calibration tables (0 LOWEST .. 3 HIGH).
    pub tx_power_mode: u8,
    /// Broadcast period in milliseconds.
    pub period_ms: u16,
    /// Declared power byte per mode (dBm, two's complement).
    pub adv_tx_power_levels: [u8; TX_POWER_LEVELS],
    /// Radio transmit level per mode (`esp_power_level_t` index).
    pub radio_tx_power_levels: [u8; TX_POWER_LEVELS],
}

impl Default for BeaconDefaults {
    fn default() -> Self {
        let mut name = heapless::Vec::new();
        let _ = name.extend_from_slice(b"Bt");
        let mut uri = heapless::Vec::new();
        // 0x02 = "http://"
        let _ = uri.extend_from_slice(b"\x02betrack.co");

        Self {
            name,
            uri,
            flags: 0x00,
            tx_power_mode: 1, // LOW
            period_ms: 10_000,
            adv_tx_power_levels: [(-18i8) as u8, (-10i8) as u8, (-2i8) as u8, 6],
            // -12 dBm, -9 dBm, 0 dBm, +6 dBm
            radio_tx_power_levels: [0, 1, 4, 6],
        }
    }
}

/// Platform limits for the radio and storage adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Offset of the beacon record in the persistent image.
    pub nvm_base_offset: u16,
    /// Largest fragment handed to the radio in one submit (31 minus the
    /// 3-byte flags structure the stack prepends).
    pub fragment_budget: usize,
    /// Advertising interval accepted by the controller, in milliseconds.
    pub adv_interval_min_ms: u16,
    pub adv_interval_max_ms: u16,
    /// GAP device name used while a peer is configuring the beacon.
    pub device_name: heapless::String<24>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        let _ = device_name.push_str("esurl-beacon");

        Self {
            nvm_base_offset: 0,
            fragment_budget: 28,
            adv_interval_min_ms: 20,
            adv_interval_max_ms: 10_240,
            device_name,
        }
    }
}

impl PlatformConfig {
    /// Clamp a broadcast period into the controller's advertising window.
    pub fn clamp_adv_interval(&self, period_ms: u16) -> u16 {
        period_ms.clamp(self.adv_interval_min_ms, self.adv_interval_max_ms)
    }
}
