//! Envelope layout and the write-side envelope builder.
//!
//! ```text
//! [8-byte TAG_BEGIN][104-byte key block][8-byte LE length][length bytes of payload]
//! ```

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{ContentKey, PublicKey};
use crate::payload::encrypt_payload;
use crate::wrap::{wrap_content_key, KEY_BLOCK_LENGTH};
use rand::RngCore;

/// Byte repeated to form the begin tag.
pub const TAG_SYMBOL: u8 = b'"';
/// Marker in front of every envelope.
pub const TAG_BEGIN: [u8; 8] = [TAG_SYMBOL; 8];
/// Width of the little-endian payload length field.
pub const DATA_LENGTH_SIZE: usize = 8;
/// Bytes in front of the payload: tag, key block and length.
pub const ENVELOPE_HEADER_LENGTH: usize = TAG_BEGIN.len() + KEY_BLOCK_LENGTH + DATA_LENGTH_SIZE;

/// Builds an envelope for `plaintext`, wrapped to `public_key` and bound to
/// `context_id` (a client ID or zone ID).
pub fn create_envelope(
    public_key: &PublicKey,
    context_id: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let content_key = ContentKey::generate();
    create_envelope_with_key(&content_key, public_key, context_id, plaintext)
}

/// Builds an envelope using a caller-chosen content key.
pub fn create_envelope_with_key(
    content_key: &ContentKey,
    public_key: &PublicKey,
    context_id: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let key_block = wrap_content_key(public_key, content_key)?;
    let payload = encrypt_payload(content_key, context_id, plaintext)?;
    let len = u64::try_from(payload.len()).map_err(|_| CryptoError::PayloadTooLarge {
        len: payload.len(),
    })?;

    let mut out = Vec::with_capacity(ENVELOPE_HEADER_LENGTH + payload.len());
    out.extend_from_slice(&TAG_BEGIN);
    out.extend_from_slice(&key_block);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend(payload);
    Ok(out)
}

/// Builds a poison record: an envelope whose content key is the poison key,
/// carrying `data_len` random bytes.
///
/// Planted in a table, it trips detection as soon as something reads it back
/// through the decryptor.
pub fn create_poison_record(
    poison_key: &ContentKey,
    public_key: &PublicKey,
    context_id: &[u8],
    data_len: usize,
) -> CryptoResult<Vec<u8>> {
    let mut data = vec![0u8; data_len];
    rand::thread_rng().fill_bytes(&mut data);
    create_envelope_with_key(poison_key, public_key, context_id, &data)
}

/// Finds the first begin tag in `block`.
#[must_use]
pub fn begin_tag_index(block: &[u8]) -> Option<usize> {
    block
        .windows(TAG_BEGIN.len())
        .position(|window| window == TAG_BEGIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::payload::decrypt_payload;
    use crate::wrap::unwrap_content_key;

    #[test]
    fn envelope_layout() {
        let pair = KeyPair::generate();
        let env = create_envelope(&pair.public, b"client", b"hello").unwrap();

        assert_eq!(&env[..8], &TAG_BEGIN);
        let len_start = TAG_BEGIN.len() + KEY_BLOCK_LENGTH;
        let mut len_bytes = [0u8; DATA_LENGTH_SIZE];
        len_bytes.copy_from_slice(&env[len_start..len_start + DATA_LENGTH_SIZE]);
        let len = u64::from_le_bytes(len_bytes) as usize;
        assert_eq!(env.len(), ENVELOPE_HEADER_LENGTH + len);

        let key = unwrap_content_key(&pair.private, &env[8..8 + KEY_BLOCK_LENGTH]).unwrap();
        let plain = decrypt_payload(&key, b"client", &env[ENVELOPE_HEADER_LENGTH..]).unwrap();
        assert_eq!(plain, b"hello");
    }

    #[test]
    fn poison_record_uses_poison_key() {
        let pair = KeyPair::generate();
        let poison = ContentKey::generate();
        let record = create_poison_record(&poison, &pair.public, b"client", 40).unwrap();

        let key = unwrap_content_key(&pair.private, &record[8..8 + KEY_BLOCK_LENGTH]).unwrap();
        assert!(key.ct_eq(&poison));
        let data = decrypt_payload(&key, b"client", &record[ENVELOPE_HEADER_LENGTH..]).unwrap();
        assert_eq!(data.len(), 40);
    }

    #[test]
    fn find_begin_tag() {
        assert_eq!(begin_tag_index(b"abc\"\"\"\"\"\"\"\"def"), Some(3));
        assert_eq!(begin_tag_index(b"\"\"\"\"\"\"\"x"), None);
        assert_eq!(begin_tag_index(b""), None);
    }
}
