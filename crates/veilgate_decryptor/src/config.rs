//! Decryptor configuration.

use crate::error::{DecryptError, DecryptResult};
use veilgate_crypto::MIN_CIPHERTEXT_LEN;

/// Default cap on the payload length field: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD_LEN: u64 = 64 * 1024 * 1024;

/// Configuration for a [`crate::StreamDecryptor`].
#[derive(Debug, Clone)]
pub struct DecryptorConfig {
    /// Client ID whose key opens envelopes outside of zones.
    pub client_id: Vec<u8>,

    /// Whether envelopes are only recognized after a zone ID.
    pub zone_mode: bool,

    /// Whether unwrapped content keys are compared against the poison key.
    pub check_poison: bool,

    /// Largest payload length accepted from an envelope header.
    pub max_payload_len: u64,

    /// How many times a transient key store failure is tried before the
    /// stream fails. 1 means no retry.
    pub key_fetch_attempts: u32,

    /// Capacity of the input read buffer.
    pub read_buffer_size: usize,

    /// Largest plain chunk yielded as a single event.
    pub max_plain_chunk: usize,
}

impl Default for DecryptorConfig {
    fn default() -> Self {
        Self {
            client_id: Vec::new(),
            zone_mode: false,
            check_poison: true,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            key_fetch_attempts: 1,
            read_buffer_size: 8 * 1024, // 8 KB
            max_plain_chunk: 64 * 1024, // 64 KB
        }
    }
}

impl DecryptorConfig {
    /// Creates a configuration for `client_id` with default values.
    #[must_use]
    pub fn new(client_id: impl Into<Vec<u8>>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the client ID.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<Vec<u8>>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Enables or disables zone mode.
    #[must_use]
    pub const fn zone_mode(mut self, value: bool) -> Self {
        self.zone_mode = value;
        self
    }

    /// Enables or disables the poison key check.
    #[must_use]
    pub const fn check_poison(mut self, value: bool) -> Self {
        self.check_poison = value;
        self
    }

    /// Sets the payload length cap.
    #[must_use]
    pub const fn max_payload_len(mut self, len: u64) -> Self {
        self.max_payload_len = len;
        self
    }

    /// Sets how many times a transient key lookup failure is tried.
    #[must_use]
    pub const fn key_fetch_attempts(mut self, attempts: u32) -> Self {
        self.key_fetch_attempts = attempts;
        self
    }

    /// Sets the input buffer capacity.
    #[must_use]
    pub const fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Sets the largest plain chunk per event.
    #[must_use]
    pub const fn max_plain_chunk(mut self, size: usize) -> Self {
        self.max_plain_chunk = size;
        self
    }

    /// Checks the configuration before any stream is processed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> DecryptResult<()> {
        if !self.zone_mode && self.client_id.is_empty() {
            return Err(DecryptError::invalid_config(
                "client_id is required outside zone mode",
            ));
        }
        if self.max_payload_len < MIN_CIPHERTEXT_LEN as u64 {
            return Err(DecryptError::invalid_config(format!(
                "max_payload_len must be at least {MIN_CIPHERTEXT_LEN}"
            )));
        }
        if self.key_fetch_attempts == 0 {
            return Err(DecryptError::invalid_config(
                "key_fetch_attempts must be at least 1",
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(DecryptError::invalid_config("read_buffer_size must be non-zero"));
        }
        if self.max_plain_chunk == 0 {
            return Err(DecryptError::invalid_config("max_plain_chunk must be non-zero"));
        }
        Ok(())
    }
}
