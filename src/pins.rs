//! Peripheral assignments for the beacon board.
//!
//! Every driver references this module rather than hard-coding channel
//! numbers.

// ---------------------------------------------------------------------------
// Sensors: Analog (ADC1)
// ---------------------------------------------------------------------------

/// Battery sense: cell voltage through a 1:2 resistive divider.
/// ADC1 channel 3 (GPIO 4 on ESP32-S3).
pub const BATTERY_ADC_CHANNEL: u32 = 3;

/// Divider ratio of the battery sense network (V_cell = V_adc * ratio).
pub const BATTERY_DIVIDER_RATIO: u32 = 2;

/// NTC thermistor: 10 kΩ @ 25 °C, voltage-divider to ADC.
/// ADC1 channel 8 (GPIO 9 on ESP32-S3).
pub const TEMP_ADC_CHANNEL: u32 = 8;
