//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor driver and answers the [`SensorPort`] queries
//! the refresh scheduler makes once per cycle.

pub mod battery;
pub mod temperature;

use log::debug;

use crate::app::ports::SensorPort;
use battery::BatterySensor;
use temperature::TemperatureSensor;

/// Aggregates the sensor drivers behind [`SensorPort`].
pub struct SensorHub {
    pub battery: BatterySensor,
    pub temperature: TemperatureSensor,
}

impl SensorHub {
    pub fn new(battery: BatterySensor, temperature: TemperatureSensor) -> Self {
        Self {
            battery,
            temperature,
        }
    }
}

impl SensorPort for SensorHub {
    fn battery_percent(&mut self) -> u8 {
        let reading = self.battery.read();
        debug!("SensorHub: battery {} mV ({}%)", reading.millivolts, reading.percent);
        reading.percent
    }

    fn temperature(&mut self) -> i16 {
        let reading = self.temperature.read();
        debug!("SensorHub: temperature raw={} {:.1}C", reading.raw, reading.celsius);
        reading.fixed_8_8()
    }
}
