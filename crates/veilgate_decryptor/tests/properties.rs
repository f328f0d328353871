//! Property tests for the stream decryptor.

use proptest::prelude::*;
use veilgate_crypto::TAG_BEGIN;
use veilgate_decryptor::{DecryptorConfig, ScanEvent, StreamDecryptor};
use veilgate_testkit::prelude::*;

fn decryptor(keys: &TestKeys, read_buffer_size: usize) -> StreamDecryptor {
    StreamDecryptor::new(
        DecryptorConfig::new(TEST_CLIENT_ID)
            .read_buffer_size(read_buffer_size)
            .max_plain_chunk(16),
        keys.provider(),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn plain_data_is_unchanged(data in tag_heavy_bytes(512)) {
        let keys = TestKeys::new();
        let out = decryptor(&keys, 8 * 1024).decrypt_bytes(&data).unwrap();
        prop_assert_eq!(out, data);
    }

    #[test]
    fn envelopes_decrypt_among_noise(segments in segments_strategy(), buffer in 1usize..64) {
        let keys = TestKeys::new();
        let case = build_case(&keys, &segments);
        let out = decryptor(&keys, buffer).decrypt_bytes(&case.input).unwrap();
        prop_assert_eq!(out, case.expected);
    }

    #[test]
    fn every_plain_byte_is_counted_once(data in tag_heavy_bytes(256)) {
        let keys = TestKeys::new();
        let decryptor = decryptor(&keys, 8 * 1024);
        let mut session = decryptor.session(&data[..]);
        let mut total = 0usize;
        while let Some(event) = session.next_event().unwrap() {
            prop_assert!(matches!(event, ScanEvent::Plain(_)));
            // a held partial tag can push one chunk past the limit
            prop_assert!(event.bytes().len() <= 16 + TAG_BEGIN.len());
            total += event.bytes().len();
        }
        prop_assert_eq!(total, data.len());
        prop_assert_eq!(session.stats().plain_bytes, data.len() as u64);
        prop_assert_eq!(session.stats().decrypted, 0);
    }

    #[test]
    fn false_tag_before_envelope_is_recovered(
        prefix in tag_heavy_bytes(32),
        plaintext in plaintext_strategy(),
    ) {
        let keys = TestKeys::new();
        let case = StreamCase::new()
            .plain(&prefix)
            .plain(&TAG_BEGIN)
            .secret(&keys, &plaintext);
        let out = decryptor(&keys, 8 * 1024).decrypt_bytes(&case.input).unwrap();
        prop_assert_eq!(out, case.expected);
    }
}
