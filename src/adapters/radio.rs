//! Radio adapter: raw advertising through the Bluedroid GAP API.
//!
//! Implements [`RadioPort`].  Fragments are accumulated per data store
//! (advertising / scan response) and the whole store is handed to the
//! controller after every append, so the controller never sees a partial
//! AD structure.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_ble_gap_config_*_data_raw`,
//!   `esp_ble_gap_start_advertising`, `esp_ble_tx_power_set`.
//! - **all other targets**: state is recorded for host-side inspection.

use core::time::Duration;

use heapless::Vec;
use log::{info, warn};

use crate::app::ports::{AdTarget, RadioPort};
use crate::beacon::encoder::AD_PAYLOAD_MAX;
use crate::error::RadioError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// One BLE advertising interval unit is 0.625 ms.
const INTERVAL_UNIT_US: u64 = 625;
/// Controller limits for non-connectable advertising (20 ms – 10.24 s).
const INTERVAL_UNITS_MIN: u16 = 0x0020;
const INTERVAL_UNITS_MAX: u16 = 0x4000;

type AdStore = Vec<u8, AD_PAYLOAD_MAX>;

fn interval_units(interval: Duration) -> u16 {
    let units = (interval.as_micros() / u128::from(INTERVAL_UNIT_US)) as u64;
    units.clamp(u64::from(INTERVAL_UNITS_MIN), u64::from(INTERVAL_UNITS_MAX)) as u16
}

pub struct RadioAdapter {
    adv: AdStore,
    scan_rsp: AdStore,
    interval_units: u16,
    tx_level: Option<u8>,
    broadcaster: bool,
    advertising: bool,
}

impl RadioAdapter {
    pub fn new() -> Self {
        Self {
            adv: Vec::new(),
            scan_rsp: Vec::new(),
            interval_units: INTERVAL_UNITS_MAX,
            tx_level: None,
            broadcaster: false,
            advertising: false,
        }
    }

    fn store(&mut self, target: AdTarget) -> &mut AdStore {
        match target {
            AdTarget::Advertise => &mut self.adv,
            AdTarget::ScanResponse => &mut self.scan_rsp,
        }
    }

    pub fn data(&self, target: AdTarget) -> &[u8] {
        match target {
            AdTarget::Advertise => &self.adv,
            AdTarget::ScanResponse => &self.scan_rsp,
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    pub fn tx_level(&self) -> Option<u8> {
        self.tx_level
    }

    /// Current advertising interval in 0.625 ms units.
    pub fn interval_units(&self) -> u16 {
        self.interval_units
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_config_data(&self, target: AdTarget) -> Result<(), RadioError> {
        let data = self.data(target);
        // SAFETY: Bluedroid copies the buffer before returning.
        let ret = unsafe {
            match target {
                AdTarget::Advertise => {
                    esp_ble_gap_config_adv_data_raw(data.as_ptr() as *mut u8, data.len() as u32)
                }
                AdTarget::ScanResponse => esp_ble_gap_config_scan_rsp_data_raw(
                    data.as_ptr() as *mut u8,
                    data.len() as u32,
                ),
            }
        };
        if ret != ESP_OK {
            warn!("Radio: config {:?} data failed (rc={})", target, ret);
            return Err(RadioError::Rejected);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_config_data(&self, target: AdTarget) -> Result<(), RadioError> {
        log::debug!("Radio(sim): {:?} data = {:02x?}", target, self.data(target));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), RadioError> {
        let adv_type = if self.scan_rsp.is_empty() {
            esp_ble_adv_type_t_ADV_TYPE_NONCONN_IND
        } else {
            esp_ble_adv_type_t_ADV_TYPE_SCAN_IND
        };
        // SAFETY: the parameter block is copied by Bluedroid.
        let ret = unsafe {
            let mut params = esp_ble_adv_params_t {
                adv_int_min: self.interval_units,
                adv_int_max: self.interval_units,
                adv_type,
                own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
                adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
                ..core::mem::zeroed()
            };
            esp_ble_gap_start_advertising(&mut params)
        };
        if ret != ESP_OK {
            warn!("Radio: start advertising failed (rc={})", ret);
            return Err(RadioError::Rejected);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), RadioError> {
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) {
        // SAFETY: stopping when idle is harmless.
        unsafe {
            esp_ble_gap_stop_advertising();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_tx_power(&mut self, level: u8) -> Result<(), RadioError> {
        // SAFETY: plain controller call; the level is range-checked by the
        // controller.
        let ret = unsafe {
            esp_ble_tx_power_set(
                esp_ble_power_type_t_ESP_BLE_PWR_TYPE_ADV,
                esp_power_level_t::from(level),
            )
        };
        if ret != ESP_OK {
            warn!("Radio: tx power level {} refused (rc={})", level, ret);
            return Err(RadioError::Rejected);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_tx_power(&mut self, _level: u8) -> Result<(), RadioError> {
        Ok(())
    }
}

impl Default for RadioAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioPort for RadioAdapter {
    fn set_broadcaster_role(&mut self) -> Result<(), RadioError> {
        // Non-connectable advertising types are chosen in `start_advertising`;
        // the beacon never initiates pairing, so nothing else to configure.
        if !self.broadcaster {
            info!("Radio: broadcaster role");
        }
        self.broadcaster = true;
        Ok(())
    }

    /// Takes effect at the next `start_advertising`; the scheduler restarts
    /// a running broadcast when the interval changes.
    fn set_interval(&mut self, interval: Duration) -> Result<(), RadioError> {
        self.interval_units = interval_units(interval);
        Ok(())
    }

    fn clear(&mut self, target: AdTarget) -> Result<(), RadioError> {
        self.store(target).clear();
        self.platform_config_data(target)
    }

    fn store_fragment(&mut self, target: AdTarget, fragment: &[u8]) -> Result<(), RadioError> {
        let store = self.store(target);
        let before = store.len();
        if store.extend_from_slice(fragment).is_err() {
            store.truncate(before);
            warn!(
                "Radio: {:?} store full ({} + {} > {})",
                target,
                before,
                fragment.len(),
                AD_PAYLOAD_MAX
            );
            return Err(RadioError::Rejected);
        }
        self.platform_config_data(target)
    }

    fn set_tx_power(&mut self, level: u8) -> Result<(), RadioError> {
        self.platform_tx_power(level)?;
        self.tx_level = Some(level);
        Ok(())
    }

    fn start_advertising(&mut self) -> Result<(), RadioError> {
        if !self.broadcaster {
            return Err(RadioError::Rejected);
        }
        self.platform_start()?;
        self.advertising = true;
        info!(
            "Radio: advertising ({} + {} bytes, interval {} units)",
            self.adv.len(),
            self.scan_rsp.len(),
            self.interval_units
        );
        Ok(())
    }

    fn stop_advertising(&mut self) {
        if self.advertising {
            self.platform_stop();
            info!("Radio: advertising stopped");
        }
        self.advertising = false;
    }
}

/// Bring up the BLE controller and Bluedroid host, BLE only.
#[cfg(target_os = "espidf")]
pub fn init_stack(device_name: &str) -> Result<(), RadioError> {
    // SAFETY: called once from main() before any other BLE call.
    unsafe {
        // Release classic BT memory (BLE-only mode saves ~30 KB).
        esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

        let mut bt_cfg = esp_bt_controller_config_t::default();
        check("bt_controller_init", esp_bt_controller_init(&mut bt_cfg))?;
        check(
            "bt_controller_enable",
            esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
        )?;
        check("bluedroid_init", esp_bluedroid_init())?;
        check("bluedroid_enable", esp_bluedroid_enable())?;

        let mut name: heapless::Vec<u8, 32> = heapless::Vec::new();
        let _ = name.extend_from_slice(device_name.as_bytes());
        let _ = name.push(0);
        esp_ble_gap_set_device_name(name.as_ptr() as *const _);
    }
    info!("Radio: Bluedroid stack initialized ('{}')", device_name);
    Ok(())
}

#[cfg(target_os = "espidf")]
fn check(what: &str, ret: esp_err_t) -> Result<(), RadioError> {
    if ret != ESP_OK {
        log::error!("Radio: {} failed ({})", what, ret);
        return Err(RadioError::Rejected);
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_stack(device_name: &str) -> Result<(), RadioError> {
    info!("Radio(sim): stack initialized ('{}')", device_name);
    Ok(())
}
