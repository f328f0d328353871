//! Zone identifiers.
//!
//! A zone ID is an 8-byte prefix of `D` followed by 16 ASCII letters. It sits
//! in the plaintext stream in front of envelopes that were written for the
//! zone, and selects which key opens them.

use crate::error::{CryptoError, CryptoResult};
use rand::Rng;

/// Prefix that starts every zone ID.
pub const ZONE_ID_BEGIN: [u8; 8] = [b'D'; 8];
/// Number of letters after the prefix.
pub const ZONE_ID_BLOCK_LENGTH: usize = 16;
/// Total length of a zone ID.
pub const ZONE_ID_LENGTH: usize = ZONE_ID_BEGIN.len() + ZONE_ID_BLOCK_LENGTH;

const ZONE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// A validated zone identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ZoneId([u8; ZONE_ID_LENGTH]);

impl ZoneId {
    /// Generates a new random zone ID.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; ZONE_ID_LENGTH];
        bytes[..ZONE_ID_BEGIN.len()].copy_from_slice(&ZONE_ID_BEGIN);
        for b in &mut bytes[ZONE_ID_BEGIN.len()..] {
            *b = ZONE_ALPHABET[rng.gen_range(0..ZONE_ALPHABET.len())];
        }
        Self(bytes)
    }

    /// Parses a zone ID, checking its shape.
    ///
    /// # Errors
    ///
    /// Returns `InvalidZoneId` if the bytes are not a well-formed zone ID.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if !Self::is_well_formed(bytes) {
            return Err(CryptoError::invalid_zone_id(format!(
                "expected {ZONE_ID_LENGTH} bytes: 8 x 'D' then {ZONE_ID_BLOCK_LENGTH} ASCII letters"
            )));
        }
        let mut id = [0u8; ZONE_ID_LENGTH];
        id.copy_from_slice(bytes);
        Ok(Self(id))
    }

    /// Returns true if `bytes` has the shape of a zone ID.
    #[must_use]
    pub fn is_well_formed(bytes: &[u8]) -> bool {
        bytes.len() == ZONE_ID_LENGTH
            && bytes.starts_with(&ZONE_ID_BEGIN)
            && bytes[ZONE_ID_BEGIN.len()..]
                .iter()
                .all(u8::is_ascii_alphabetic)
    }

    /// Raw bytes of the ID.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The ID as a string (always ASCII).
    #[must_use]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl std::fmt::Debug for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ZoneId").field(&self.as_str()).finish()
    }
}

impl std::fmt::Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ZoneId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}
