//! Esurl Beacon Firmware: Main Entry Point
//!
//! Hexagonal architecture with event-driven execution.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter          LogEventSink   NvsAdapter            │
//! │  (Radio+Timer+Sensors)    (EventSink)    (Persistence)         │
//! │  GattServer (attribute requests → BeaconCommand)               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            BeaconService (pure logic)                  │    │
//! │  │  ConfigStore · Encoder · Chunker · RefreshScheduler    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::time::Duration;

use anyhow::{anyhow, Result};
use log::info;

use esurl_beacon::adapters::gatt::{self, GattServer};
use esurl_beacon::adapters::hardware::HardwareAdapter;
use esurl_beacon::adapters::log_sink::LogEventSink;
use esurl_beacon::adapters::nvs::NvsAdapter;
use esurl_beacon::adapters::radio::{self, RadioAdapter};
use esurl_beacon::app::commands::BeaconCommand;
use esurl_beacon::app::service::BeaconService;
use esurl_beacon::config::{BeaconDefaults, PlatformConfig};
use esurl_beacon::drivers::{hw_init, hw_timer::HwTimer};
use esurl_beacon::events::{self, Event};
use esurl_beacon::sensors::battery::BatterySensor;
use esurl_beacon::sensors::temperature::TemperatureSensor;
use esurl_beacon::sensors::SensorHub;

/// Idle time between event-queue polls.
const LOOP_IDLE: Duration = Duration::from_millis(10);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Esurl Beacon v{}                 ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let defaults = BeaconDefaults::default();
    let platform = PlatformConfig::default();

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_peripherals().map_err(|e| anyhow!("peripheral init: {}", e))?;
    radio::init_stack(&platform.device_name).map_err(|e| anyhow!("BLE stack: {}", e))?;
    gatt::register().map_err(|e| anyhow!("GATT register: {}", e))?;

    let timer = HwTimer::new().map_err(|e| anyhow!("refresh timer: {}", e))?;
    let sensors = SensorHub::new(BatterySensor::new(), TemperatureSensor::new());
    let mut hw = HardwareAdapter::new(RadioAdapter::new(), timer, sensors);

    // ── 3. Persistence ────────────────────────────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init: {}", e))?;
    let mut log_sink = LogEventSink::new();

    // ── 4. Beacon service ─────────────────────────────────────
    let mut service = BeaconService::new(defaults, platform);
    service.boot(&mut hw, &mut nvs, &mut log_sink);
    let mut gatt_server = GattServer::new();

    info!("System ready. Entering event loop.");

    // ── 5. Event loop ─────────────────────────────────────────
    loop {
        events::drain_events(|event| match event {
            Event::RefreshTimer(handle) => {
                service.on_timer_expired(handle, &mut hw, &mut log_sink);
            }
            Event::AttRequest => {
                gatt_server.serve_pending(&mut service, &mut hw, &mut nvs, &mut log_sink);
            }
            Event::PeerDisconnected => {
                let _ = service.handle_command(
                    BeaconCommand::Disconnected,
                    &mut hw,
                    &mut nvs,
                    &mut log_sink,
                );
            }
            Event::BondingChanged => {
                let _ = service.handle_command(
                    BeaconCommand::BondingChanged,
                    &mut hw,
                    &mut nvs,
                    &mut log_sink,
                );
            }
        });

        std::thread::sleep(LOOP_IDLE);
    }
}
