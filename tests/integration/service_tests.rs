//! Integration tests for the BeaconService → scheduler → radio pipeline.
//!
//! Every test drives the service through its public entry points (boot,
//! commands, timer expiry) and checks what reached the mock adapters.

use core::time::Duration;

use esurl_beacon::app::commands::{BeaconCommand, WriteValue};
use esurl_beacon::app::events::BeaconEvent;
use esurl_beacon::app::ports::AdTarget;
use esurl_beacon::app::service::BeaconService;
use esurl_beacon::beacon::encoder;
use esurl_beacon::beacon::{AttributeId, BeaconRecord};
use esurl_beacon::config::{BeaconDefaults, PlatformConfig};
use esurl_beacon::error::{AttError, Error, StorageError};

use super::mock_hw::{MockHardware, MockNvs, RadioCall, RecordingSink};

const CODE: [u8; 16] = *b"s3cr3t-l0ck-c0de";

fn make_service() -> (BeaconService, MockHardware, MockNvs, RecordingSink) {
    let svc = BeaconService::new(BeaconDefaults::default(), PlatformConfig::default());
    (svc, MockHardware::new(), MockNvs::new(), RecordingSink::new())
}

fn booted() -> (BeaconService, MockHardware, MockNvs, RecordingSink) {
    let (mut svc, mut hw, mut nvm, mut sink) = make_service();
    svc.boot(&mut hw, &mut nvm, &mut sink);
    sink.clear();
    (svc, hw, nvm, sink)
}

fn write(attr: AttributeId, bytes: &[u8]) -> BeaconCommand {
    BeaconCommand::Write {
        attr,
        value: WriteValue::from_slice(bytes).unwrap(),
    }
}

fn stored_record(nvm: &MockNvs) -> BeaconRecord {
    BeaconRecord::decode_slot(&nvm.image[..96]).unwrap()
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn first_boot_broadcasts_defaults() {
    let (mut svc, mut hw, mut nvm, mut sink) = make_service();
    svc.boot(&mut hw, &mut nvm, &mut sink);

    assert!(sink.contains(&BeaconEvent::Started { restored: false }));
    assert!(sink.contains(&BeaconEvent::BroadcastStarted { period_ms: 10_000 }));
    assert!(hw.is_advertising());
    assert_eq!(hw.armed_after(), Some(Duration::from_millis(5000)));

    // Scan response carries the default name.
    assert_eq!(
        hw.payload(AdTarget::ScanResponse),
        vec![0x03, 0x03, 0xAA, 0xFE, 0x03, encoder::AD_TYPE_SHORT_NAME, b'B', b't']
    );

    // Advertising data: URI, battery, temperature, counter = 1.
    let adv = hw.payload(AdTarget::Advertise);
    assert_eq!(adv[5], encoder::AD_TYPE_SERVICE_DATA);
    assert_eq!(&adv[8..19], b"\x02betrack.co");
    assert_eq!(adv[19], 87);
    assert_eq!(&adv[20..22], &[0x19, 0x80]);
    assert_eq!(&adv[22..26], &1u32.to_be_bytes());
}

#[test]
fn first_boot_persists_defaults() {
    let (mut svc, mut hw, mut nvm, mut sink) = make_service();
    svc.boot(&mut hw, &mut nvm, &mut sink);

    assert_eq!(nvm.writes, 1);
    assert!(sink.contains(&BeaconEvent::Flushed { offset: 0 }));
    let rec = stored_record(&nvm);
    assert_eq!(rec.name.as_slice(), b"Bt");
    assert_eq!(rec.period, 10_000);
    assert!(!svc.store().is_dirty());
}

#[test]
fn boot_applies_tx_power_mode_to_radio() {
    let (mut svc, mut hw, mut nvm, mut sink) = make_service();
    svc.boot(&mut hw, &mut nvm, &mut sink);

    // Default mode LOW: declared -10 dBm, radio level 1.
    assert_eq!(hw.last_tx_power(), Some(1));
    assert!(sink.contains(&BeaconEvent::TxPowerApplied {
        mode: 1,
        declared_dbm: -10,
        radio_level: 1,
    }));
    assert_eq!(svc.store().declared_tx_power(), -10);
}

#[test]
fn reboot_restores_configured_record() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::Name, b"Dock7"), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    svc.handle_command(
        write(AttributeId::Period, &2000u16.to_le_bytes()),
        &mut hw,
        &mut nvm,
        &mut sink,
    )
    .unwrap();

    let (mut svc2, mut hw2, _, mut sink2) = make_service();
    svc2.boot(&mut hw2, &mut nvm, &mut sink2);

    assert!(sink2.contains(&BeaconEvent::Started { restored: true }));
    assert_eq!(svc2.store().record().name.as_slice(), b"Dock7");
    assert_eq!(svc2.store().period(), 2000);
    assert_eq!(hw2.armed_after(), Some(Duration::from_millis(1000)));
}

#[test]
fn corrupted_slot_falls_back_to_defaults() {
    let (mut svc, mut hw, mut nvm, mut sink) = make_service();
    nvm.image[0] = 0xEB;
    nvm.image[1] = 0x01;
    nvm.image[2..96].fill(0xFF);
    svc.boot(&mut hw, &mut nvm, &mut sink);

    assert!(sink.contains(&BeaconEvent::Started { restored: false }));
    assert_eq!(svc.store().record().name.as_slice(), b"Bt");
    // Defaults overwrite the unusable slot.
    assert_eq!(stored_record(&nvm).name.as_slice(), b"Bt");
}

// ── Attribute access ──────────────────────────────────────────

#[test]
fn write_persists_and_reads_back() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    let writes_before = nvm.writes;

    let rsp = svc.handle_command(write(AttributeId::Flags, &[0x10]), &mut hw, &mut nvm, &mut sink);
    assert_eq!(rsp.map(|v| v.len()), Ok(0));
    assert!(sink.contains(&BeaconEvent::AttributeWritten(AttributeId::Flags)));
    assert_eq!(nvm.writes, writes_before + 1);
    assert_eq!(stored_record(&nvm).flags, 0x10);

    let value = svc
        .handle_command(BeaconCommand::Read(AttributeId::Flags), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert_eq!(value.as_slice(), &[0x10]);
}

#[test]
fn write_only_attribute_refuses_read() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    let read = BeaconCommand::Read(AttributeId::Lock);
    let rsp = svc.handle_command(read, &mut hw, &mut nvm, &mut sink);
    assert_eq!(rsp, Err(AttError::ReadNotPermitted));
    assert!(sink.contains(&BeaconEvent::AccessRejected {
        attr: AttributeId::Lock,
        error: AttError::ReadNotPermitted,
    }));
}

#[test]
fn lock_gates_configuration_until_unlocked() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::Lock, &CODE), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert!(sink.contains(&BeaconEvent::LockChanged { locked: true }));
    assert!(stored_record(&nvm).lock_state);

    let rsp = svc.handle_command(write(AttributeId::Name, b"evil"), &mut hw, &mut nvm, &mut sink);
    assert_eq!(rsp, Err(AttError::InsufficientAuthorization));
    assert_eq!(svc.store().record().name.as_slice(), b"Bt");

    let mut wrong = CODE;
    wrong[15] ^= 1;
    let rsp = svc.handle_command(write(AttributeId::Unlock, &wrong), &mut hw, &mut nvm, &mut sink);
    assert_eq!(rsp, Err(AttError::InsufficientAuthorization));
    assert!(svc.store().is_locked());

    svc.handle_command(write(AttributeId::Unlock, &CODE), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert!(sink.contains(&BeaconEvent::LockChanged { locked: false }));
    svc.handle_command(write(AttributeId::Name, b"ok"), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert_eq!(svc.store().record().name.as_slice(), b"ok");
}

#[test]
fn lock_state_reads_while_locked() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::Lock, &CODE), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    let value = svc
        .handle_command(BeaconCommand::Read(AttributeId::LockState), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert_eq!(value.as_slice(), &[1]);
    let value = svc
        .handle_command(BeaconCommand::Read(AttributeId::Uri), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert_eq!(value.as_slice(), b"\x02betrack.co");
}

#[test]
fn reset_restores_defaults_and_reapplies_power() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::TxPowerMode, &[3]), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    svc.handle_command(write(AttributeId::Name, b"Changed"), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    // Mode change alone does not touch the radio.
    assert_eq!(hw.last_tx_power(), Some(1));

    svc.handle_command(write(AttributeId::Reset, &[1]), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert_eq!(svc.store().record().name.as_slice(), b"Bt");
    assert_eq!(svc.store().record().tx_power_mode, 1);
    assert_eq!(svc.store().record().packet_counter, 0);
    assert_eq!(hw.last_tx_power(), Some(1));
    assert_eq!(stored_record(&nvm).name.as_slice(), b"Bt");
}

// ── Link events ───────────────────────────────────────────────

#[test]
fn disconnect_applies_tx_power_mode() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::TxPowerMode, &[3]), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    svc.handle_command(BeaconCommand::Disconnected, &mut hw, &mut nvm, &mut sink)
        .unwrap();

    // HIGH: declared +6 dBm, radio level 6.
    assert_eq!(hw.last_tx_power(), Some(6));
    assert_eq!(svc.store().declared_tx_power(), 6);
    assert_eq!(stored_record(&nvm).tx_power, 6);
    assert!(sink.contains(&BeaconEvent::BroadcastStarted { period_ms: 10_000 }));
    assert!(hw.is_advertising());
}

#[test]
fn disconnect_restarts_timer_without_leaking_one() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    let first = hw.armed_handle();
    svc.handle_command(BeaconCommand::Disconnected, &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert!(hw.disarmed.contains(&first));
    assert_ne!(hw.armed_handle(), first);
}

#[test]
fn bonding_change_flushes_only_when_dirty() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    let writes = nvm.writes;
    svc.handle_command(BeaconCommand::BondingChanged, &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert_eq!(nvm.writes, writes);
}

// ── Refresh timer ─────────────────────────────────────────────

#[test]
fn timer_tick_refreshes_payload_and_counter() {
    let (mut svc, mut hw, _nvm, mut sink) = booted();
    hw.battery = 42;
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);

    let adv = hw.payload(AdTarget::Advertise);
    assert_eq!(adv[19], 42);
    assert_eq!(&adv[22..26], &2u32.to_be_bytes());
    assert_eq!(svc.store().record().packet_counter, 2);
    // Counter alone does not dirty the store.
    assert!(!svc.store().is_dirty());
}

#[test]
fn period_change_takes_effect_on_next_tick() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    assert_eq!(hw.armed_after(), Some(Duration::from_millis(5000)));

    svc.handle_command(
        write(AttributeId::Period, &2000u16.to_le_bytes()),
        &mut hw,
        &mut nvm,
        &mut sink,
    )
    .unwrap();
    hw.calls.clear();
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);

    assert_eq!(hw.armed_after(), Some(Duration::from_millis(1000)));
    assert_eq!(hw.last_interval(), Some(Duration::from_millis(2000)));
    // The new interval only reaches the controller through a restart.
    let tail: Vec<_> = hw.calls.iter().rev().take(2).rev().cloned().collect();
    assert_eq!(tail, vec![RadioCall::Stop, RadioCall::Start]);
    assert!(hw.is_advertising());
}

#[test]
fn unchanged_period_does_not_restart_advertising() {
    let (mut svc, mut hw, _nvm, mut sink) = booted();
    hw.calls.clear();
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);
    assert!(!hw.calls.contains(&RadioCall::Stop));
    assert!(!hw.calls.contains(&RadioCall::Start));
}

#[test]
fn short_period_is_clamped() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(
        write(AttributeId::Period, &50u16.to_le_bytes()),
        &mut hw,
        &mut nvm,
        &mut sink,
    )
    .unwrap();
    assert_eq!(svc.store().period(), 100);
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);
    assert_eq!(hw.armed_after(), Some(Duration::from_millis(50)));
}

#[test]
fn zero_period_stops_broadcast() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::Period, &[0, 0]), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);

    assert!(sink.contains(&BeaconEvent::BroadcastStopped));
    assert!(!hw.is_advertising());
    assert!(hw.armed.is_none());
    assert!(!svc.scheduler().is_broadcasting());
}

#[test]
fn zero_period_boot_stays_silent() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::Period, &[0, 0]), &mut hw, &mut nvm, &mut sink)
        .unwrap();

    let (mut svc2, mut hw2, _, mut sink2) = make_service();
    svc2.boot(&mut hw2, &mut nvm, &mut sink2);
    // Nothing was broadcasting, so nothing stopped.
    assert!(!sink2.contains(&BeaconEvent::BroadcastStopped));
    assert!(!hw2.calls.contains(&RadioCall::Start));
    assert!(hw2.armed.is_none());
}

#[test]
fn stale_timer_is_ignored() {
    let (mut svc, mut hw, _nvm, mut sink) = booted();
    let calls = hw.calls.len();
    svc.on_timer_expired(esurl_beacon::app::ports::TimerHandle(9999), &mut hw, &mut sink);
    assert_eq!(hw.calls.len(), calls);
    assert_eq!(svc.store().record().packet_counter, 1);
}

#[test]
fn stale_timer_does_not_stop_zero_period_broadcast() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::Period, &[0, 0]), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    let live = hw.armed_handle();
    svc.on_timer_expired(esurl_beacon::app::ports::TimerHandle(9999), &mut hw, &mut sink);

    assert!(!sink.contains(&BeaconEvent::BroadcastStopped));
    assert!(svc.scheduler().is_broadcasting());
    assert_eq!(hw.armed_handle(), live);

    // The live timer still stops it.
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);
    assert!(sink.contains(&BeaconEvent::BroadcastStopped));
}

#[test]
fn disconnect_while_idle_reports_no_stop() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    svc.handle_command(write(AttributeId::Period, &[0, 0]), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    svc.handle_command(BeaconCommand::Disconnected, &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert_eq!(
        sink.events
            .iter()
            .filter(|e| **e == BeaconEvent::BroadcastStopped)
            .count(),
        1
    );

    svc.handle_command(BeaconCommand::Disconnected, &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert_eq!(
        sink.events
            .iter()
            .filter(|e| **e == BeaconEvent::BroadcastStopped)
            .count(),
        1
    );
}

#[test]
fn longest_name_fits_one_scan_response_fragment() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    let name = [b'N'; 18];
    svc.handle_command(write(AttributeId::Name, &name), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    hw.calls.clear();
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);

    // 4-byte service list + 20-byte name structure = 24 bytes, one fragment.
    let fragments: Vec<_> = hw
        .calls
        .iter()
        .filter(|c| matches!(c, RadioCall::Fragment(AdTarget::ScanResponse, _)))
        .collect();
    assert_eq!(fragments.len(), 1);
    assert_eq!(hw.payload(AdTarget::ScanResponse).len(), 24);
}

// ── Failure paths ─────────────────────────────────────────────

#[test]
fn flush_failure_keeps_store_dirty_and_retries() {
    let (mut svc, mut hw, mut nvm, mut sink) = booted();
    nvm.fail_writes = true;
    svc.handle_command(write(AttributeId::Flags, &[1]), &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert!(sink.contains(&BeaconEvent::FlushFailed(Error::Storage(StorageError::IoError))));
    assert!(svc.store().is_dirty());

    nvm.fail_writes = false;
    svc.handle_command(BeaconCommand::BondingChanged, &mut hw, &mut nvm, &mut sink)
        .unwrap();
    assert!(!svc.store().is_dirty());
    assert_eq!(stored_record(&nvm).flags, 1);
}

#[test]
fn rejected_radio_keeps_broadcast_schedule() {
    let (mut svc, mut hw, _nvm, mut sink) = booted();
    hw.fragment_error = Some(esurl_beacon::RadioError::Rejected);
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);

    assert!(svc.scheduler().is_broadcasting());
    assert!(hw.armed.is_some());
    assert!(!sink.events.iter().any(|e| matches!(e, BeaconEvent::RadioFault(_))));
}

#[test]
fn timer_failure_stops_broadcast_with_fault() {
    let (mut svc, mut hw, _nvm, mut sink) = booted();
    hw.arm_fails = true;
    let handle = hw.fire();
    svc.on_timer_expired(handle, &mut hw, &mut sink);

    assert!(sink.contains(&BeaconEvent::RadioFault(
        esurl_beacon::RadioError::TimerUnavailable
    )));
    assert!(!svc.scheduler().is_broadcasting());
    assert!(!hw.is_advertising());
    assert!(hw.armed.is_none());
}
