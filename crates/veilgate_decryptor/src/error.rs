//! Error types for the stream decryptor.

use std::io;
use thiserror::Error;
use veilgate_keystore::KeyStoreError;

/// Result type for decryptor operations.
pub type DecryptResult<T> = Result<T, DecryptError>;

/// Errors that end a decryption stream.
///
/// Fake envelopes are not errors: their bytes are passed through as plain
/// data. Everything here is fatal for the stream it occurs on, and only for
/// that stream.
#[derive(Debug, Error)]
pub enum DecryptError {
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key provider could not supply a key.
    #[error("{kind} key unavailable after {attempts} attempt(s): {source}")]
    KeyUnavailable {
        /// "client", "zone" or "poison".
        kind: &'static str,
        /// Number of lookups made.
        attempts: u32,
        /// The key store failure.
        #[source]
        source: KeyStoreError,
    },

    /// A poison callback failed.
    #[error("poison callback failed: {message}")]
    PoisonCallback {
        /// Description of the failure.
        message: String,
    },

    /// The stream was stopped through its shutdown signal.
    #[error("stream cancelled")]
    Cancelled,

    /// The decryptor configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// A value expected to be exactly one envelope is not one.
    #[error("not an envelope: {message}")]
    NotAnEnvelope {
        /// Why the value was rejected.
        message: String,
    },
}

impl DecryptError {
    /// Creates a key unavailable error.
    pub fn key_unavailable(kind: &'static str, attempts: u32, source: KeyStoreError) -> Self {
        Self::KeyUnavailable {
            kind,
            attempts,
            source,
        }
    }

    /// Creates a poison callback error.
    pub fn poison_callback(message: impl Into<String>) -> Self {
        Self::PoisonCallback {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a not-an-envelope error.
    pub fn not_an_envelope(message: impl Into<String>) -> Self {
        Self::NotAnEnvelope {
            message: message.into(),
        }
    }

    /// Returns true for key provider failures.
    pub fn is_key_error(&self) -> bool {
        matches!(self, Self::KeyUnavailable { .. })
    }

    /// Returns true if the stream was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true for failures that indicate an attack or a poison trap.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::PoisonCallback { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let key = DecryptError::key_unavailable("client", 1, KeyStoreError::not_found("client", b"a"));
        assert!(key.is_key_error());
        assert!(!key.is_cancelled());
        assert!(DecryptError::Cancelled.is_cancelled());
        assert!(DecryptError::poison_callback("exit 1").is_security_event());
    }

    #[test]
    fn key_error_display() {
        let err = DecryptError::key_unavailable("zone", 3, KeyStoreError::unavailable("down"));
        let msg = err.to_string();
        assert!(msg.contains("zone"));
        assert!(msg.contains('3'));
        assert!(msg.contains("down"));
    }
}
