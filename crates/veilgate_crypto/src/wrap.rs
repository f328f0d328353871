//! Content-key wrapping with X25519 + XSalsa20-Poly1305.
//!
//! A key block is laid out as:
//!
//! ```text
//! [32-byte ephemeral public key][24-byte nonce][32-byte sealed key + 16-byte tag]
//! ```
//!
//! The ephemeral secret is dropped right after sealing, so only the holder of
//! the recipient private key can open the block.

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{ContentKey, KeyPair, PrivateKey, PublicKey, KEY_SIZE, PUBLIC_KEY_SIZE};
use crypto_box::aead::Aead;
use crypto_box::SalsaBox;
use rand::RngCore;
use zeroize::Zeroizing;

/// Length of the ephemeral public key at the start of a key block.
pub const PUBLIC_KEY_LENGTH: usize = PUBLIC_KEY_SIZE;
/// Length of the XSalsa20 nonce.
pub const WRAP_NONCE_LENGTH: usize = 24;
/// Length of the Poly1305 tag appended to the sealed key.
pub const WRAP_TAG_LENGTH: usize = 16;
/// Length of the wrapped key: nonce, sealed key and tag.
pub const WRAPPED_KEY_LENGTH: usize = WRAP_NONCE_LENGTH + KEY_SIZE + WRAP_TAG_LENGTH;
/// Total length of a key block.
pub const KEY_BLOCK_LENGTH: usize = PUBLIC_KEY_LENGTH + WRAPPED_KEY_LENGTH;

/// Seals `content_key` for `recipient`.
///
/// # Errors
///
/// Returns `EncryptionFailed` if the AEAD refuses to seal.
pub fn wrap_content_key(
    recipient: &PublicKey,
    content_key: &ContentKey,
) -> CryptoResult<[u8; KEY_BLOCK_LENGTH]> {
    let ephemeral = KeyPair::generate();
    let salsa_box = SalsaBox::new(&recipient.to_box_key(), &ephemeral.private.to_secret());

    let mut nonce_bytes = [0u8; WRAP_NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let sealed = salsa_box
        .encrypt(
            crypto_box::Nonce::from_slice(&nonce_bytes),
            content_key.as_bytes().as_slice(),
        )
        .map_err(|_| CryptoError::encryption_failed("key wrap failed"))?;

    if sealed.len() != KEY_SIZE + WRAP_TAG_LENGTH {
        return Err(CryptoError::encryption_failed("unexpected sealed key length"));
    }

    let mut block = [0u8; KEY_BLOCK_LENGTH];
    block[..PUBLIC_KEY_LENGTH].copy_from_slice(ephemeral.public.as_bytes());
    block[PUBLIC_KEY_LENGTH..PUBLIC_KEY_LENGTH + WRAP_NONCE_LENGTH].copy_from_slice(&nonce_bytes);
    block[PUBLIC_KEY_LENGTH + WRAP_NONCE_LENGTH..].copy_from_slice(&sealed);
    Ok(block)
}

/// Opens a key block with the recipient's private key.
///
/// # Errors
///
/// `MalformedEnvelope` if the block has the wrong length, and
/// `AuthenticationFailed` if the block was not sealed for this key.
pub fn unwrap_content_key(private_key: &PrivateKey, key_block: &[u8]) -> CryptoResult<ContentKey> {
    if key_block.len() != KEY_BLOCK_LENGTH {
        return Err(CryptoError::malformed(format!(
            "key block is {} bytes, expected {KEY_BLOCK_LENGTH}",
            key_block.len()
        )));
    }

    let (ephemeral, wrapped) = key_block.split_at(PUBLIC_KEY_LENGTH);
    let (nonce, sealed) = wrapped.split_at(WRAP_NONCE_LENGTH);
    let ephemeral = PublicKey::from_bytes(ephemeral)?;

    let salsa_box = SalsaBox::new(&ephemeral.to_box_key(), &private_key.to_secret());
    let opened = Zeroizing::new(
        salsa_box
            .decrypt(crypto_box::Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::authentication_failed("key block did not open"))?,
    );

    ContentKey::from_bytes(&opened).map_err(|_| CryptoError::malformed("wrapped key has wrong size"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_layout_constants() {
        assert_eq!(WRAPPED_KEY_LENGTH, 72);
        assert_eq!(KEY_BLOCK_LENGTH, 104);
    }

    #[test]
    fn wrap_unwrap() {
        let pair = KeyPair::generate();
        let key = ContentKey::generate();

        let block = wrap_content_key(&pair.public, &key).unwrap();
        let opened = unwrap_content_key(&pair.private, &block).unwrap();

        assert!(opened.ct_eq(&key));
    }

    #[test]
    fn wrong_private_key_fails() {
        let pair = KeyPair::generate();
        let other = KeyPair::generate();
        let block = wrap_content_key(&pair.public, &ContentKey::generate()).unwrap();

        let err = unwrap_content_key(&other.private, &block).unwrap_err();
        assert!(err.is_not_an_envelope());
    }

    #[test]
    fn tampered_block_fails() {
        let pair = KeyPair::generate();
        let mut block = wrap_content_key(&pair.public, &ContentKey::generate()).unwrap();
        block[KEY_BLOCK_LENGTH - 1] ^= 0x01;

        assert!(unwrap_content_key(&pair.private, &block).is_err());
    }

    #[test]
    fn short_block_is_malformed() {
        let pair = KeyPair::generate();
        let err = unwrap_content_key(&pair.private, &[0u8; 50]).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEnvelope { .. }));
    }

    #[test]
    fn every_wrap_is_fresh() {
        let pair = KeyPair::generate();
        let key = ContentKey::generate();
        let a = wrap_content_key(&pair.public, &key).unwrap();
        let b = wrap_content_key(&pair.public, &key).unwrap();
        assert_ne!(a, b);
    }
}
