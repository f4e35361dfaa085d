//! End-to-end runs over the simulation backends of the real adapters.
//!
//! Wires the service to `HardwareAdapter` (radio, timer, sensors),
//! `NvsAdapter` and `GattServer` exactly as `main` does.  Only
//! `gatt_requests_flow_through_event_queue` touches the global request
//! channel and event queue.

use core::time::Duration;

use esurl_beacon::adapters::gatt::{self, GattRequest, GattServer};
use esurl_beacon::adapters::hardware::HardwareAdapter;
use esurl_beacon::adapters::log_sink::LogEventSink;
use esurl_beacon::adapters::nvs::NvsAdapter;
use esurl_beacon::adapters::radio::RadioAdapter;
use esurl_beacon::app::events::BeaconEvent;
use esurl_beacon::app::ports::AdTarget;
use esurl_beacon::app::service::BeaconService;
use esurl_beacon::beacon::AttributeId;
use esurl_beacon::config::{BeaconDefaults, PlatformConfig};
use esurl_beacon::drivers::hw_timer::HwTimer;
use esurl_beacon::error::AttError;
use esurl_beacon::events::{self, Event};
use esurl_beacon::sensors::battery::BatterySensor;
use esurl_beacon::sensors::temperature::TemperatureSensor;
use esurl_beacon::sensors::SensorHub;

use super::mock_hw::RecordingSink;

const SERVICE_START: u16 = 40;

fn make_hw() -> HardwareAdapter {
    let timer = HwTimer::new().unwrap();
    let sensors = SensorHub::new(BatterySensor::new(), TemperatureSensor::new());
    HardwareAdapter::new(RadioAdapter::new(), timer, sensors)
}

fn boot() -> (BeaconService, HardwareAdapter, NvsAdapter) {
    let mut svc = BeaconService::new(BeaconDefaults::default(), PlatformConfig::default());
    let mut hw = make_hw();
    let mut nvs = NvsAdapter::new().unwrap();
    svc.boot(&mut hw, &mut nvs, &mut LogEventSink::new());
    (svc, hw, nvs)
}

#[test]
fn boot_programs_radio_stores() {
    let (_svc, hw, nvs) = boot();

    assert!(hw.radio.is_advertising());
    assert_eq!(hw.radio.tx_level(), Some(1));
    // 10 s in 0.625 ms units.
    assert_eq!(hw.radio.interval_units(), 16_000);
    assert_eq!(hw.radio.data(AdTarget::ScanResponse).len(), 8);

    let adv = hw.radio.data(AdTarget::Advertise);
    assert_eq!(adv.len(), 26);
    assert_eq!(&adv[8..19], b"\x02betrack.co");

    let (_, after) = hw.timer.armed().unwrap();
    assert_eq!(after, Duration::from_millis(5000));
    assert_eq!(nvs.image()[0], 0xEB);
}

#[test]
fn stored_image_survives_reboot() {
    let (mut svc, mut hw, mut nvs) = boot();
    let server = GattServer::new(SERVICE_START);
    let mut sink = RecordingSink::new();
    let cmd = server
        .decode(&GattRequest::write(
            1,
            1,
            AttributeId::Name.handle(SERVICE_START),
            b"Shelf",
        ))
        .unwrap();
    svc.handle_command(cmd, &mut hw, &mut nvs, &mut sink).unwrap();

    let mut nvs2 = NvsAdapter::with_image(nvs.image());
    let mut svc2 = BeaconService::new(BeaconDefaults::default(), PlatformConfig::default());
    let mut hw2 = make_hw();
    let mut sink2 = RecordingSink::new();
    svc2.boot(&mut hw2, &mut nvs2, &mut sink2);

    assert!(sink2.contains(&BeaconEvent::Started { restored: true }));
    assert_eq!(&hw2.radio.data(AdTarget::ScanResponse)[6..], b"Shelf");
}

#[test]
fn foreign_and_oversized_requests_are_refused() {
    let (mut svc, mut hw, mut nvs) = boot();
    let mut server = GattServer::new(SERVICE_START);
    let mut sink = RecordingSink::new();

    // Service declaration handle is not a value handle.
    server.serve(
        GattRequest::read(1, 1, SERVICE_START),
        &mut svc,
        &mut hw,
        &mut nvs,
        &mut sink,
    );
    // Past the end of the table.
    let past_end = SERVICE_START + AttributeId::table_len() as u16 + 1;
    server.serve(
        GattRequest::write(1, 2, past_end, &[0]),
        &mut svc,
        &mut hw,
        &mut nvs,
        &mut sink,
    );
    let name = AttributeId::Name.handle(SERVICE_START);
    server.serve(
        GattRequest::write(1, 3, name, &[b'x'; 40]),
        &mut svc,
        &mut hw,
        &mut nvs,
        &mut sink,
    );

    let results: Vec<_> = server.responses().iter().map(|(_, r)| r.clone()).collect();
    assert_eq!(
        results,
        vec![
            Err(AttError::ReadNotPermitted),
            Err(AttError::WriteNotPermitted),
            Err(AttError::InvalidLength),
        ]
    );
    assert_eq!(
        sink.events,
        vec![BeaconEvent::AccessRejected {
            attr: AttributeId::Name,
            error: AttError::InvalidLength,
        }]
    );
    assert_eq!(svc.store().record().name.as_slice(), b"Bt");
}

#[test]
fn write_without_response_is_not_answered() {
    let (mut svc, mut hw, mut nvs) = boot();
    let mut server = GattServer::new(SERVICE_START);
    let mut req = GattRequest::write(1, 1, AttributeId::Flags.handle(SERVICE_START), &[3]);
    req.need_rsp = false;
    server.serve(req, &mut svc, &mut hw, &mut nvs, &mut LogEventSink::new());

    assert!(server.responses().is_empty());
    assert_eq!(svc.store().record().flags, 3);
}

#[test]
fn gatt_requests_flow_through_event_queue() {
    let (mut svc, mut hw, mut nvs) = boot();
    let mut server = GattServer::new(SERVICE_START);
    let mut sink = RecordingSink::new();
    let period = AttributeId::Period.handle(SERVICE_START);

    assert!(gatt::submit(GattRequest::write(
        7,
        10,
        period,
        &1000u16.to_le_bytes()
    )));
    assert!(gatt::submit(GattRequest::read(7, 11, period)));
    let fired = hw.timer.sim_fire().unwrap();

    let mut served = 0;
    events::drain_events(|event| match event {
        Event::AttRequest => {
            served += server.serve_pending(&mut svc, &mut hw, &mut nvs, &mut sink);
        }
        Event::RefreshTimer(handle) => {
            assert_eq!(handle, fired);
            svc.on_timer_expired(handle, &mut hw, &mut sink);
        }
        other => panic!("unexpected event {other:?}"),
    });

    assert_eq!(served, 2);
    assert!(events::queue_is_empty());
    let responses = server.responses();
    assert_eq!(responses[0].0.trans_id, 10);
    assert_eq!(responses[0].1.as_ref().map(|v| v.len()), Ok(0));
    assert_eq!(
        responses[1].1.as_ref().map(|v| v.as_slice()),
        Ok(&1000u16.to_le_bytes()[..])
    );

    // The refresh after the write re-armed at half the new period.
    let (_, after) = hw.timer.armed().unwrap();
    assert_eq!(after, Duration::from_millis(500));
    assert_eq!(hw.radio.interval_units(), 1600);
}
