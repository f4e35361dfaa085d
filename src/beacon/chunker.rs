//! Splits an AD stream into radio-sized fragments.
//!
//! The stream is a concatenation of `[len][type][payload]` structures.
//! Whole structures are packed greedily into fragments of at most `budget`
//! bytes; a structure is never split.  Concatenating the fragments gives
//! back the original stream.
//!
//! The stream is validated in full before anything reaches the radio, so a
//! malformed stream never leaves a half-submitted payload behind.

use crate::app::ports::{AdTarget, RadioPort};
use crate::error::RadioError;

/// Iterator over the fragments of a validated stream.
pub struct Fragments<'a> {
    stream: &'a [u8],
    budget: usize,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Result<&'a [u8], RadioError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stream.is_empty() {
            return None;
        }
        let mut end = 0;
        while end < self.stream.len() {
            let len = usize::from(self.stream[end]);
            if len == 0 || end + 1 + len > self.stream.len() {
                self.stream = &[];
                return Some(Err(RadioError::MalformedStream));
            }
            let next = end + 1 + len;
            if next > self.budget {
                if end == 0 {
                    self.stream = &[];
                    return Some(Err(RadioError::FragmentOverBudget));
                }
                break;
            }
            end = next;
        }
        let (fragment, rest) = self.stream.split_at(end);
        self.stream = rest;
        Some(Ok(fragment))
    }
}

/// Fragment `stream` into pieces of at most `budget` bytes.
pub fn fragments(stream: &[u8], budget: usize) -> Fragments<'_> {
    Fragments { stream, budget }
}

/// Submit `stream` to `target` fragment by fragment.  An empty stream is
/// submitted as one zero-length fragment.  Returns the fragment count.
pub fn submit(
    radio: &mut impl RadioPort,
    target: AdTarget,
    stream: &[u8],
    budget: usize,
) -> Result<usize, RadioError> {
    if stream.is_empty() {
        radio.store_fragment(target, &[])?;
        return Ok(1);
    }
    for fragment in fragments(stream, budget) {
        fragment?;
    }
    let mut count = 0;
    for fragment in fragments(stream, budget) {
        radio.store_fragment(target, fragment?)?;
        count += 1;
    }
    Ok(count)
}
