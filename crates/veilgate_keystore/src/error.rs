//! Error types for key stores.

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use veilgate_crypto::CryptoError;

/// Result type for key store operations.
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

/// Errors that can occur while loading or generating keys.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// No key exists for the requested owner.
    #[error("{kind} key not found for '{id}'")]
    NotFound {
        /// What was looked up ("client", "zone", "poison").
        kind: &'static str,
        /// The owner ID, lossily rendered.
        id: String,
    },

    /// A client or zone ID is not usable as a key name.
    #[error("invalid key id: {message}")]
    InvalidId {
        /// Why the ID was rejected.
        message: String,
    },

    /// A key file exists but does not hold a valid key.
    #[error("invalid key material: {message}")]
    InvalidKeyMaterial {
        /// Description of the problem.
        message: String,
    },

    /// A key file or directory is readable by other users.
    #[error("insecure permissions on {path}: mode {mode:o}")]
    InsecurePermissions {
        /// The offending path.
        path: PathBuf,
        /// The permission bits found.
        mode: u32,
    },

    /// The store was configured incorrectly.
    #[error("invalid key store configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The backing store is temporarily unavailable.
    #[error("key store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl KeyStoreError {
    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, id: &[u8]) -> Self {
        Self::NotFound {
            kind,
            id: String::from_utf8_lossy(id).into_owned(),
        }
    }

    /// Creates an invalid ID error.
    pub fn invalid_id(message: impl Into<String>) -> Self {
        Self::InvalidId {
            message: message.into(),
        }
    }

    /// Creates an invalid key material error.
    pub fn invalid_key_material(message: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns true if retrying the same lookup may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Io(_))
    }

    /// Returns true if the key simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
