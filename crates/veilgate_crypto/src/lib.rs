//! # Veilgate Crypto
//!
//! Envelope format and primitives for Veilgate.
//!
//! An envelope is an opaque encrypted value embedded in a plaintext byte
//! stream. It starts with [`TAG_BEGIN`], carries a content key sealed to an
//! X25519 public key, and an AES-256-GCM payload bound to the client or zone
//! ID it was written for.
//!
//! ## Example
//!
//! ```rust
//! use veilgate_crypto::{create_envelope, unwrap_content_key, decrypt_payload, KeyPair};
//! use veilgate_crypto::{TAG_BEGIN, KEY_BLOCK_LENGTH, ENVELOPE_HEADER_LENGTH};
//!
//! let pair = KeyPair::generate();
//! let envelope = create_envelope(&pair.public, b"client", b"secret").unwrap();
//!
//! let block = &envelope[TAG_BEGIN.len()..TAG_BEGIN.len() + KEY_BLOCK_LENGTH];
//! let key = unwrap_content_key(&pair.private, block).unwrap();
//! let plain = decrypt_payload(&key, b"client", &envelope[ENVELOPE_HEADER_LENGTH..]).unwrap();
//! assert_eq!(plain, b"secret");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod envelope;
mod error;
mod keys;
mod payload;
mod wrap;
mod zone;

pub use envelope::{
    begin_tag_index, create_envelope, create_envelope_with_key, create_poison_record,
    DATA_LENGTH_SIZE, ENVELOPE_HEADER_LENGTH, TAG_BEGIN, TAG_SYMBOL,
};
pub use error::{CryptoError, CryptoResult};
pub use keys::{
    fingerprint, ContentKey, KeyPair, PrivateKey, PublicKey, KEY_SIZE, PRIVATE_KEY_SIZE,
    PUBLIC_KEY_SIZE,
};
pub use payload::{decrypt_payload, encrypt_payload, PayloadCipher, MIN_CIPHERTEXT_LEN, NONCE_SIZE, TAG_SIZE};
pub use wrap::{
    unwrap_content_key, wrap_content_key, KEY_BLOCK_LENGTH, PUBLIC_KEY_LENGTH, WRAPPED_KEY_LENGTH,
    WRAP_NONCE_LENGTH, WRAP_TAG_LENGTH,
};
pub use zone::{ZoneId, ZONE_ID_BEGIN, ZONE_ID_BLOCK_LENGTH, ZONE_ID_LENGTH};
