//! Fuzz target: `BeaconRecord::decode_slot`
//!
//! Feeds arbitrary flash contents to the slot decoder.  Anything it accepts
//! must satisfy the record invariants and re-encode to a slot that decodes
//! to the same record.
//!
//! cargo fuzz run fuzz_record_slot

#![no_main]

use esurl_beacon::beacon::BeaconRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = BeaconRecord::decode_slot(data) else {
        return;
    };
    assert!(record.is_valid(), "decoder accepted an invalid record");

    let slot = record.encode_slot().expect("decoded record must fit its slot");
    let again = BeaconRecord::decode_slot(&slot).expect("re-encoded slot must decode");
    assert_eq!(record, again);
});
