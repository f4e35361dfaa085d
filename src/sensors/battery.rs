//! Battery level sensor.
//!
//! The cell voltage is read through a resistive divider on ADC1 and mapped
//! linearly from 2.0 V (empty) to 3.0 V (full), clamped to 0–100 %.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads a static AtomicU16 holding millivolts for injection.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg_attr(target_os = "espidf", allow(dead_code))]
static SIM_BATTERY_MV: AtomicU16 = AtomicU16::new(3000);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_battery_mv(mv: u16) {
    SIM_BATTERY_MV.store(mv, Ordering::Relaxed);
}

const EMPTY_MV: u32 = 2000;
const FULL_MV: u32 = 3000;
#[cfg(target_os = "espidf")]
const ADC_MAX: u32 = 4095;
#[cfg(target_os = "espidf")]
const V_REF_MV: u32 = 3300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    pub millivolts: u16,
    pub percent: u8,
}

pub struct BatterySensor;

impl BatterySensor {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&self) -> BatteryReading {
        let millivolts = self.read_mv();
        BatteryReading {
            millivolts,
            percent: mv_to_percent(millivolts),
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_mv(&self) -> u16 {
        let raw = u32::from(hw_init::adc1_read(pins::BATTERY_ADC_CHANNEL));
        let mv = raw * V_REF_MV / ADC_MAX * pins::BATTERY_DIVIDER_RATIO;
        mv.min(u32::from(u16::MAX)) as u16
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_mv(&self) -> u16 {
        SIM_BATTERY_MV.load(Ordering::Relaxed)
    }
}

impl Default for BatterySensor {
    fn default() -> Self {
        Self::new()
    }
}

fn mv_to_percent(mv: u16) -> u8 {
    let mv = u32::from(mv).clamp(EMPTY_MV, FULL_MV);
    ((mv - EMPTY_MV) * 100 / (FULL_MV - EMPTY_MV)) as u8
}
