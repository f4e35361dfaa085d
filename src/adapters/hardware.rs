//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`RadioAdapter`], the refresh [`HwTimer`] and the
//! [`SensorHub`], exposing them through [`RadioPort`], [`TimerPort`] and
//! [`SensorPort`] as one value the service can borrow.  On non-espidf
//! targets the underlying drivers use cfg-gated simulation stubs.

use core::time::Duration;

use crate::app::ports::{AdTarget, RadioPort, SensorPort, TimerHandle, TimerPort};
use crate::drivers::hw_timer::HwTimer;
use crate::error::RadioError;
use crate::sensors::SensorHub;

use super::radio::RadioAdapter;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    pub radio: RadioAdapter,
    pub timer: HwTimer,
    pub sensors: SensorHub,
}

impl HardwareAdapter {
    pub fn new(radio: RadioAdapter, timer: HwTimer, sensors: SensorHub) -> Self {
        Self {
            radio,
            timer,
            sensors,
        }
    }
}

// ── RadioPort implementation ──────────────────────────────────

impl RadioPort for HardwareAdapter {
    fn set_broadcaster_role(&mut self) -> Result<(), RadioError> {
        self.radio.set_broadcaster_role()
    }

    fn set_interval(&mut self, interval: Duration) -> Result<(), RadioError> {
        self.radio.set_interval(interval)
    }

    fn clear(&mut self, target: AdTarget) -> Result<(), RadioError> {
        self.radio.clear(target)
    }

    fn store_fragment(&mut self, target: AdTarget, fragment: &[u8]) -> Result<(), RadioError> {
        self.radio.store_fragment(target, fragment)
    }

    fn set_tx_power(&mut self, level: u8) -> Result<(), RadioError> {
        self.radio.set_tx_power(level)
    }

    fn start_advertising(&mut self) -> Result<(), RadioError> {
        self.radio.start_advertising()
    }

    fn stop_advertising(&mut self) {
        self.radio.stop_advertising();
    }
}

// ── TimerPort implementation ──────────────────────────────────

impl TimerPort for HardwareAdapter {
    fn arm(&mut self, after: Duration) -> Result<TimerHandle, RadioError> {
        self.timer.arm(after)
    }

    fn disarm(&mut self, handle: TimerHandle) {
        self.timer.disarm(handle);
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn battery_percent(&mut self) -> u8 {
        self.sensors.battery_percent()
    }

    fn temperature(&mut self) -> i16 {
        self.sensors.temperature()
    }
}
