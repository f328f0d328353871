//! Envelope payload encryption using AES-256-GCM.

use crate::error::{CryptoError, CryptoResult};
use crate::keys::ContentKey;
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Smallest possible payload ciphertext (empty plaintext).
pub const MIN_CIPHERTEXT_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// AES-256-GCM cipher bound to one content key.
///
/// Ciphertext format is `nonce (12 bytes) || body || tag (16 bytes)`. The
/// associated data is the client or zone ID the envelope was written for.
pub struct PayloadCipher {
    cipher: Aes256Gcm,
}

impl PayloadCipher {
    /// Creates a cipher for the given content key.
    #[must_use]
    pub fn new(key: &ContentKey) -> Self {
        let key_array = GenericArray::from_slice(key.as_bytes());
        Self {
            cipher: Aes256Gcm::new(key_array),
        }
    }

    /// Encrypts `plaintext`, binding it to `associated_data`.
    pub fn encrypt(&self, plaintext: &[u8], associated_data: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let payload = Payload {
            msg: plaintext,
            aad: associated_data,
        };
        let ciphertext = self
            .cipher
            .encrypt(nonce, payload)
            .map_err(|_| CryptoError::encryption_failed("payload encryption error"))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend(ciphertext);
        Ok(result)
    }

    /// Decrypts data produced by [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// `MalformedEnvelope` if the input is shorter than nonce plus tag, and
    /// `AuthenticationFailed` on a wrong key, wrong associated data or
    /// corrupted bytes.
    pub fn decrypt(&self, ciphertext: &[u8], associated_data: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < MIN_CIPHERTEXT_LEN {
            return Err(CryptoError::malformed("payload too short"));
        }

        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);
        let payload = Payload {
            msg: &ciphertext[NONCE_SIZE..],
            aad: associated_data,
        };

        self.cipher
            .decrypt(nonce, payload)
            .map_err(|_| CryptoError::authentication_failed("payload did not authenticate"))
    }
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCipher")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}

/// Encrypts an envelope payload with a one-time content key.
pub fn encrypt_payload(
    content_key: &ContentKey,
    associated_data: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    PayloadCipher::new(content_key).encrypt(plaintext, associated_data)
}

/// Decrypts an envelope payload.
pub fn decrypt_payload(
    content_key: &ContentKey,
    associated_data: &[u8],
    ciphertext: &[u8],
) -> CryptoResult<Vec<u8>> {
    PayloadCipher::new(content_key).decrypt(ciphertext, associated_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::ZeroizeOnDrop;

    fn wiped_on_drop<T: ZeroizeOnDrop>() {}

    #[test]
    fn key_material_is_wiped_on_drop() {
        wiped_on_drop::<ContentKey>();
        wiped_on_drop::<aes::Aes256>();
    }

    #[test]
    fn encrypt_decrypt() {
        let key = ContentKey::generate();
        let ciphertext = encrypt_payload(&key, b"client", b"row value").unwrap();

        assert_ne!(&ciphertext[NONCE_SIZE..], b"row value");
        assert_eq!(decrypt_payload(&key, b"client", &ciphertext).unwrap(), b"row value");
    }

    #[test]
    fn nonce_is_random() {
        let cipher = PayloadCipher::new(&ContentKey::generate());
        let ct1 = cipher.encrypt(b"same data", b"id").unwrap();
        let ct2 = cipher.encrypt(b"same data", b"id").unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn wrong_key_fails() {
        let ciphertext = encrypt_payload(&ContentKey::generate(), b"id", b"secret").unwrap();
        let err = decrypt_payload(&ContentKey::generate(), b"id", &ciphertext).unwrap_err();
        assert!(err.is_not_an_envelope());
    }

    #[test]
    fn wrong_associated_data_fails() {
        let key = ContentKey::generate();
        let ciphertext = encrypt_payload(&key, b"client_a", b"secret").unwrap();
        assert!(decrypt_payload(&key, b"client_b", &ciphertext).is_err());
    }

    #[test]
    fn corrupted_data_fails() {
        let key = ContentKey::generate();
        let mut ciphertext = encrypt_payload(&key, b"id", b"data").unwrap();
        let len = ciphertext.len();
        ciphertext[len - 1] ^= 0xFF;
        assert!(decrypt_payload(&key, b"id", &ciphertext).is_err());
    }

    #[test]
    fn too_short_is_malformed() {
        let key = ContentKey::generate();
        let err = decrypt_payload(&key, b"id", &[0u8; 10]).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEnvelope { .. }));
    }

    #[test]
    fn empty_plaintext() {
        let key = ContentKey::generate();
        let ciphertext = encrypt_payload(&key, b"id", b"").unwrap();
        assert_eq!(ciphertext.len(), MIN_CIPHERTEXT_LEN);
        assert!(decrypt_payload(&key, b"id", &ciphertext).unwrap().is_empty());
    }
}
