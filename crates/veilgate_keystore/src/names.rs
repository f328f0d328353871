//! Key file names and owner ID validation.

use crate::error::{KeyStoreError, KeyStoreResult};

/// Longest accepted client or zone ID.
pub const MAX_ID_LENGTH: usize = 256;
/// File name of the poison key.
pub const POISON_KEY_FILENAME: &str = "poison_key";

/// Checks that `id` is safe to use as part of a file name.
///
/// Accepted: 1 to 256 bytes of ASCII letters, digits, `_`, `-` and `.`,
/// not starting with `.`.
pub fn validate_id(id: &[u8]) -> KeyStoreResult<&str> {
    if id.is_empty() || id.len() > MAX_ID_LENGTH {
        return Err(KeyStoreError::invalid_id(format!(
            "length {} outside 1..={MAX_ID_LENGTH}",
            id.len()
        )));
    }
    if id[0] == b'.' {
        return Err(KeyStoreError::invalid_id("must not start with '.'"));
    }
    if let Some(bad) = id
        .iter()
        .find(|b| !(b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.')))
    {
        return Err(KeyStoreError::invalid_id(format!(
            "byte 0x{bad:02x} not allowed"
        )));
    }
    std::str::from_utf8(id).map_err(|_| KeyStoreError::invalid_id("not ASCII"))
}

/// Private key file for a client ID.
pub fn client_private_filename(id: &str) -> String {
    format!("{id}_storage")
}

/// Public key file for a client ID.
pub fn client_public_filename(id: &str) -> String {
    format!("{id}_storage.pub")
}

/// Private key file for a zone ID.
pub fn zone_private_filename(id: &str) -> String {
    format!("{id}_zone")
}

/// Public key file for a zone ID.
pub fn zone_public_filename(id: &str) -> String {
    format!("{id}_zone.pub")
}
