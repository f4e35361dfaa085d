//! ConfigStore persistence and radio submission against mock adapters.

use esurl_beacon::app::ports::AdTarget;
use esurl_beacon::beacon::{chunker, AttributeId, ConfigStore};
use esurl_beacon::config::{BeaconDefaults, RECORD_SLOT_SIZE};
use esurl_beacon::error::{Error, RadioError, RecordError, StorageError};

use super::mock_hw::{MockHardware, MockNvs, RadioCall};

fn store_at(offset: u16) -> ConfigStore {
    ConfigStore::new(BeaconDefaults::default(), offset)
}

// ── Flush / restore ───────────────────────────────────────────

#[test]
fn flush_returns_next_free_offset() {
    let mut nvm = MockNvs::new();
    let mut store = store_at(32);
    let next = store.flush(&mut nvm, 32).unwrap();
    assert_eq!(usize::from(next), 32 + RECORD_SLOT_SIZE);
    assert_eq!(nvm.image[32], 0xEB);
    // Bytes before the slot are untouched.
    assert!(nvm.image[..32].iter().all(|&b| b == 0));
}

#[test]
fn clean_flush_skips_write() {
    let mut nvm = MockNvs::new();
    let mut store = store_at(0);
    store.flush(&mut nvm, 0).unwrap();
    assert_eq!(nvm.writes, 1);
    let next = store.flush(&mut nvm, 0).unwrap();
    assert_eq!(nvm.writes, 1);
    assert_eq!(usize::from(next), RECORD_SLOT_SIZE);
}

#[test]
fn restore_returns_record_written_by_flush() {
    let mut nvm = MockNvs::new();
    let mut a = store_at(0);
    a.write(AttributeId::Uri, b"\x03beta.io").unwrap();
    a.write(AttributeId::AdvTxPowerLevels, &[0xE0, 0xF0, 0x00, 0x04]).unwrap();
    a.flush(&mut nvm, 0).unwrap();

    let mut b = store_at(0);
    let next = b.restore(&nvm, 0).unwrap();
    assert_eq!(usize::from(next), RECORD_SLOT_SIZE);
    assert_eq!(b.record(), a.record());
    assert!(!b.is_dirty());
}

#[test]
fn restore_of_blank_flash_reports_bad_magic() {
    let nvm = MockNvs::new();
    let mut store = store_at(0);
    store.write(AttributeId::Flags, &[9]).unwrap();
    assert_eq!(store.restore(&nvm, 0), Err(Error::Record(RecordError::BadMagic)));
    // In-memory record untouched.
    assert_eq!(store.record().flags, 9);
}

#[test]
fn out_of_range_offsets_fail() {
    let mut nvm = MockNvs::new();
    let mut store = store_at(200);
    assert_eq!(
        store.flush(&mut nvm, 200),
        Err(Error::Storage(StorageError::OutOfRange))
    );
    assert!(store.is_dirty());
    assert_eq!(
        store.flush(&mut nvm, u16::MAX),
        Err(Error::Storage(StorageError::OutOfRange))
    );
}

#[test]
fn flush_remembered_uses_last_restore_offset() {
    let mut nvm = MockNvs::new();
    let mut seed = store_at(64);
    seed.flush(&mut nvm, 64).unwrap();

    let mut store = store_at(0);
    store.restore(&nvm, 64).unwrap();
    store.write(AttributeId::Flags, &[0x77]).unwrap();
    store.flush_remembered(&mut nvm).unwrap();

    let mut check = store_at(0);
    check.restore(&nvm, 64).unwrap();
    assert_eq!(check.record().flags, 0x77);
    assert!(nvm.image[..64].iter().all(|&b| b == 0));
}

// ── TX power ──────────────────────────────────────────────────

#[test]
fn apply_tx_power_uses_both_tables() {
    let mut hw = MockHardware::new();
    let mut store = store_at(0);
    store.write(AttributeId::RadioTxPowerLevels, &[2, 3, 5, 7]).unwrap();
    store.write(AttributeId::TxPowerMode, &[2]).unwrap();
    store.apply_tx_power_mode(&mut hw).unwrap();

    assert_eq!(hw.last_tx_power(), Some(5));
    assert_eq!(store.declared_tx_power(), -2);
    assert_eq!(store.record().tx_power, (-2i8) as u8);
}

// ── Chunked submission ────────────────────────────────────────

#[test]
fn submit_splits_on_structure_boundaries() {
    let mut hw = MockHardware::new();
    // Three 14-byte structures: 28 fits two, the third spills.
    let mut stream = Vec::new();
    for t in 0..3u8 {
        stream.push(13);
        stream.push(0xF0 + t);
        stream.extend_from_slice(&[t; 12]);
    }
    let count = chunker::submit(&mut hw, AdTarget::Advertise, &stream, 28).unwrap();
    assert_eq!(count, 2);
    assert_eq!(hw.payload(AdTarget::Advertise), stream);
    let sizes: Vec<usize> = hw
        .calls
        .iter()
        .filter_map(|c| match c {
            RadioCall::Fragment(_, f) => Some(f.len()),
            _ => None,
        })
        .collect();
    assert_eq!(sizes, vec![28, 14]);
}

#[test]
fn malformed_stream_submits_nothing() {
    let mut hw = MockHardware::new();
    let stream = [3, 0x01, 0xAA, 0xBB, 9, 0x02];
    assert_eq!(
        chunker::submit(&mut hw, AdTarget::Advertise, &stream, 28),
        Err(RadioError::MalformedStream)
    );
    assert!(hw.calls.is_empty());
}

#[test]
fn empty_stream_submits_one_empty_fragment() {
    let mut hw = MockHardware::new();
    assert_eq!(chunker::submit(&mut hw, AdTarget::ScanResponse, &[], 28), Ok(1));
    assert_eq!(hw.calls, vec![RadioCall::Fragment(AdTarget::ScanResponse, vec![])]);
}
