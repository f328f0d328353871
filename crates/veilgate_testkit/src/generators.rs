//! Property-based test generators using proptest.
//!
//! Streams are biased towards the begin tag symbol so that partial and
//! full false tag matches are common.

use crate::fixtures::{StreamCase, TestKeys};
use proptest::prelude::*;
use veilgate_crypto::TAG_SYMBOL;

/// Strategy for single stream bytes, about half of them tag symbols.
pub fn tag_heavy_byte() -> impl Strategy<Value = u8> {
    prop_oneof![Just(TAG_SYMBOL), any::<u8>()]
}

/// Strategy for plain data full of tag symbols and tag-length runs.
pub fn tag_heavy_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(tag_heavy_byte(), 0..max_len)
}

/// Strategy for arbitrary plaintext of an envelope.
pub fn plaintext_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// One piece of a generated stream.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Bytes that must pass through.
    Plain(Vec<u8>),
    /// Plaintext to wrap into an envelope.
    Secret(Vec<u8>),
}

/// Strategy for an interleaving of plain data and envelopes.
pub fn segments_strategy() -> impl Strategy<Value = Vec<Segment>> {
    prop::collection::vec(
        prop_oneof![
            3 => tag_heavy_bytes(48).prop_map(Segment::Plain),
            1 => plaintext_strategy().prop_map(Segment::Secret),
        ],
        0..8,
    )
}

/// Turns segments into a stream case using `keys`.
pub fn build_case(keys: &TestKeys, segments: &[Segment]) -> StreamCase {
    segments
        .iter()
        .fold(StreamCase::new(), |case, segment| match segment {
            Segment::Plain(bytes) => case.plain(bytes),
            Segment::Secret(plaintext) => case.secret(keys, plaintext),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn tag_heavy_bytes_contain_symbols() {
        let mut runner = TestRunner::default();
        let mut seen = false;
        for _ in 0..16 {
            let bytes = tag_heavy_bytes(64)
                .new_tree(&mut runner)
                .expect("Failed to generate")
                .current();
            seen |= bytes.contains(&TAG_SYMBOL);
        }
        assert!(seen);
    }

    #[test]
    fn build_case_tracks_expected_output() {
        let keys = TestKeys::new();
        let case = build_case(
            &keys,
            &[
                Segment::Plain(b"a".to_vec()),
                Segment::Secret(b"s".to_vec()),
                Segment::Plain(b"b".to_vec()),
            ],
        );
        assert_eq!(case.expected, b"asb");
        assert!(case.input.len() > 3);
    }
}
