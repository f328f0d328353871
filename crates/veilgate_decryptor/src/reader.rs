//! Reads the body of a candidate envelope after a full tag match.

use crate::input::ScanInput;
use std::io::{self, Read};
use tracing::trace;
use veilgate_crypto::{
    DATA_LENGTH_SIZE, ENVELOPE_HEADER_LENGTH, KEY_BLOCK_LENGTH, MIN_CIPHERTEXT_LEN, TAG_BEGIN,
};

const KEY_BLOCK_START: usize = TAG_BEGIN.len();
const LENGTH_START: usize = KEY_BLOCK_START + KEY_BLOCK_LENGTH;

/// Accumulates every byte consumed for one envelope attempt, tag included,
/// so a fake can be replayed exactly.
///
/// The read methods return `Ok(false)` when the bytes cannot be a genuine
/// envelope (stream ended early, length out of range) and `Err` only for
/// I/O failures.
#[derive(Debug)]
pub(crate) struct EnvelopeReader {
    consumed: Vec<u8>,
}

impl EnvelopeReader {
    pub(crate) fn new(tag: Vec<u8>) -> Self {
        let mut consumed = tag;
        consumed.reserve(KEY_BLOCK_LENGTH + DATA_LENGTH_SIZE);
        Self { consumed }
    }

    pub(crate) fn read_key_block<R: Read>(&mut self, input: &mut ScanInput<R>) -> io::Result<bool> {
        input.read_exact_or_eof(&mut self.consumed, KEY_BLOCK_LENGTH)
    }

    pub(crate) fn key_block(&self) -> &[u8] {
        &self.consumed[KEY_BLOCK_START..LENGTH_START]
    }

    pub(crate) fn read_payload<R: Read>(
        &mut self,
        input: &mut ScanInput<R>,
        max_payload_len: u64,
    ) -> io::Result<bool> {
        if !input.read_exact_or_eof(&mut self.consumed, DATA_LENGTH_SIZE)? {
            return Ok(false);
        }

        let mut len_bytes = [0u8; DATA_LENGTH_SIZE];
        len_bytes.copy_from_slice(&self.consumed[LENGTH_START..ENVELOPE_HEADER_LENGTH]);
        let len = u64::from_le_bytes(len_bytes);

        if len > max_payload_len || len < MIN_CIPHERTEXT_LEN as u64 {
            trace!(len, max_payload_len, "payload length out of range");
            return Ok(false);
        }
        let Ok(len) = usize::try_from(len) else {
            return Ok(false);
        };
        input.read_exact_or_eof(&mut self.consumed, len)
    }

    pub(crate) fn ciphertext(&self) -> &[u8] {
        self.consumed.get(ENVELOPE_HEADER_LENGTH..).unwrap_or_default()
    }

    pub(crate) fn into_consumed(self) -> Vec<u8> {
        self.consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilgate_crypto::{create_envelope, KeyPair};

    fn body_after_tag(envelope: &[u8]) -> ScanInput<&[u8]> {
        ScanInput::new(&envelope[TAG_BEGIN.len()..], 16)
    }

    #[test]
    fn reads_whole_envelope() {
        let pair = KeyPair::generate();
        let envelope = create_envelope(&pair.public, b"id", b"payload").unwrap();
        let mut input = body_after_tag(&envelope);

        let mut reader = EnvelopeReader::new(TAG_BEGIN.to_vec());
        assert!(reader.read_key_block(&mut input).unwrap());
        assert_eq!(reader.key_block(), &envelope[8..8 + KEY_BLOCK_LENGTH]);
        assert!(reader.read_payload(&mut input, 1024).unwrap());
        assert_eq!(reader.ciphertext(), &envelope[ENVELOPE_HEADER_LENGTH..]);
        assert_eq!(reader.into_consumed(), envelope);
    }

    #[test]
    fn short_key_block_is_fake() {
        let mut input = ScanInput::new(&[7u8; 40][..], 16);
        let mut reader = EnvelopeReader::new(TAG_BEGIN.to_vec());
        assert!(!reader.read_key_block(&mut input).unwrap());
        assert_eq!(reader.into_consumed().len(), 8 + 40);
    }

    #[test]
    fn over_cap_length_is_fake() {
        let pair = KeyPair::generate();
        let envelope = create_envelope(&pair.public, b"id", &[0u8; 100]).unwrap();
        let mut input = body_after_tag(&envelope);

        let mut reader = EnvelopeReader::new(TAG_BEGIN.to_vec());
        assert!(reader.read_key_block(&mut input).unwrap());
        assert!(!reader.read_payload(&mut input, 64).unwrap());
        assert_eq!(reader.into_consumed().len(), ENVELOPE_HEADER_LENGTH);
    }

    #[test]
    fn truncated_payload_is_fake() {
        let pair = KeyPair::generate();
        let envelope = create_envelope(&pair.public, b"id", b"abcdef").unwrap();
        let cut = &envelope[..envelope.len() - 3];
        let mut input = body_after_tag(cut);

        let mut reader = EnvelopeReader::new(TAG_BEGIN.to_vec());
        assert!(reader.read_key_block(&mut input).unwrap());
        assert!(!reader.read_payload(&mut input, 1024).unwrap());
        assert_eq!(reader.into_consumed(), cut);
    }
}
