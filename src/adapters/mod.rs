//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                        | Connects to                 |
//! |-------------|-----------------------------------|-----------------------------|
//! | `gatt`      | attribute transport → commands    | Bluedroid GATT server       |
//! | `hardware`  | RadioPort, TimerPort, SensorPort  | radio + esp_timer + ADC     |
//! | `log_sink`  | EventSink                         | Serial log output           |
//! | `nvs`       | PersistencePort                   | NVS blob / in-memory image  |
//! | `radio`     | RadioPort                         | Bluedroid GAP raw adv data  |

pub mod gatt;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod radio;
