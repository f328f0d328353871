//! Key material: content keys, X25519 private/public keys and key pairs.

use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a content (symmetric) key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of an X25519 private key in bytes.
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an X25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// One-time symmetric key that encrypts a single envelope payload.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    bytes: [u8; KEY_SIZE],
}

impl ContentKey {
    /// Generates a new random content key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::invalid_key_size(bytes.len(), KEY_SIZE));
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Be careful with this method - don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Compares two keys without an early exit on the first differing byte.
    #[must_use]
    pub fn ct_eq(&self, other: &ContentKey) -> bool {
        self.bytes
            .iter()
            .zip(other.bytes.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// X25519 private key used to unwrap content keys.
///
/// Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: [u8; PRIVATE_KEY_SIZE],
}

impl PrivateKey {
    /// Creates a private key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::invalid_key_size(bytes.len(), PRIVATE_KEY_SIZE));
        }
        let mut key_bytes = [0u8; PRIVATE_KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Returns the raw key bytes.
    ///
    /// # Security
    ///
    /// Only for persisting the key; never log the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.bytes
    }

    /// Derives the matching public key.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        let public = self.to_secret().public_key();
        PublicKey {
            bytes: *public.as_bytes(),
        }
    }

    pub(crate) fn to_secret(&self) -> crypto_box::SecretKey {
        crypto_box::SecretKey::from(self.bytes)
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// X25519 public key that envelopes are wrapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_SIZE],
}

impl PublicKey {
    /// Creates a public key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; PUBLIC_KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::invalid_key_size(bytes.len(), PUBLIC_KEY_SIZE))?;
        Ok(Self { bytes })
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.bytes
    }

    /// Short hex fingerprint (first 8 bytes of SHA-256), safe to log.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.bytes)
    }

    pub(crate) fn to_box_key(self) -> crypto_box::PublicKey {
        crypto_box::PublicKey::from(self.bytes)
    }
}

/// Private key together with its public key.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// The private half.
    pub private: PrivateKey,
    /// The public half.
    pub public: PublicKey,
}

impl KeyPair {
    /// Generates a new random X25519 key pair.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        let private = PrivateKey { bytes };
        bytes.zeroize();
        let public = private.public_key();
        Self { private, public }
    }

    /// Rebuilds a key pair from a private key.
    #[must_use]
    pub fn from_private(private: PrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }
}

/// Short hex fingerprint of arbitrary key material.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_content_key() {
        let key1 = ContentKey::generate();
        let key2 = ContentKey::generate();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn content_key_wrong_size() {
        assert!(ContentKey::from_bytes(&[0u8; 16]).is_err());
        assert!(ContentKey::from_bytes(&[0u8; 64]).is_err());
    }

    #[test]
    fn content_key_equality() {
        let key = ContentKey::from_bytes(&[7u8; KEY_SIZE]).unwrap();
        let same = ContentKey::from_bytes(&[7u8; KEY_SIZE]).unwrap();
        let mut other_bytes = [7u8; KEY_SIZE];
        other_bytes[31] = 8;
        let other = ContentKey::from_bytes(&other_bytes).unwrap();

        assert!(key.ct_eq(&same));
        assert!(!key.ct_eq(&other));
    }

    #[test]
    fn debug_is_redacted() {
        let key = ContentKey::from_bytes(&[0xAB; KEY_SIZE]).unwrap();
        let private = PrivateKey::from_bytes(&[0xCD; PRIVATE_KEY_SIZE]).unwrap();
        assert!(format!("{key:?}").contains("REDACTED"));
        assert!(!format!("{private:?}").contains("205"));
    }

    #[test]
    fn keypair_public_matches_private() {
        let pair = KeyPair::generate();
        assert_eq!(pair.private.public_key(), pair.public);

        let rebuilt = KeyPair::from_private(PrivateKey::from_bytes(pair.private.as_bytes()).unwrap());
        assert_eq!(rebuilt.public, pair.public);
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let pair = KeyPair::generate();
        let fp = pair.public.fingerprint();
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, pair.public.fingerprint());
    }

    #[test]
    fn public_key_wrong_size() {
        assert!(PublicKey::from_bytes(&[1u8; 31]).is_err());
        assert!(PublicKey::from_bytes(&[1u8; 32]).is_ok());
    }
}
