//! Fuzz target: `chunker::fragments`
//!
//! The first byte picks a budget, the rest is an arbitrary AD stream.  The
//! fragmenter must never panic, never exceed the budget, and when it
//! succeeds the fragments must concatenate back to the stream.
//!
//! cargo fuzz run fuzz_ad_chunker

#![no_main]

use esurl_beacon::beacon::chunker;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&budget, stream)) = data.split_first() else {
        return;
    };
    let budget = usize::from(budget);

    let mut joined = Vec::with_capacity(stream.len());
    for fragment in chunker::fragments(stream, budget) {
        let Ok(fragment) = fragment else {
            return;
        };
        assert!(!fragment.is_empty(), "empty fragment");
        assert!(fragment.len() <= budget, "fragment over budget");
        joined.extend_from_slice(fragment);
    }
    assert_eq!(joined, stream);
});
