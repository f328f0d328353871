//! Error types for Veilgate cryptographic operations.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while building or opening envelopes.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key size.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// Authentication tag did not verify (wrong key, tampered or foreign data).
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Bytes do not have the shape of an envelope component.
    #[error("malformed envelope: {message}")]
    MalformedEnvelope {
        /// Description of the structural problem.
        message: String,
    },

    /// Payload is larger than the envelope length field can describe.
    #[error("payload too large: {len} bytes")]
    PayloadTooLarge {
        /// Payload length in bytes.
        len: usize,
    },

    /// Zone identifier has the wrong shape.
    #[error("invalid zone id: {message}")]
    InvalidZoneId {
        /// Description of the problem.
        message: String,
    },
}

impl CryptoError {
    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { expected, actual }
    }

    /// Creates an authentication failure.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            message: message.into(),
        }
    }

    /// Creates an encryption failure.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a malformed envelope error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            message: message.into(),
        }
    }

    /// Creates an invalid zone id error.
    pub fn invalid_zone_id(message: impl Into<String>) -> Self {
        Self::InvalidZoneId {
            message: message.into(),
        }
    }

    /// Returns true if the error means "these bytes are not a genuine envelope".
    ///
    /// Such failures are expected when the begin tag occurs in ordinary data.
    pub fn is_not_an_envelope(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::MalformedEnvelope { .. }
        )
    }
}
