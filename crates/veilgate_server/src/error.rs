//! Error types for the proxy.

use std::net::SocketAddr;
use thiserror::Error;
use veilgate_decryptor::DecryptError;

/// Result type for proxy operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the proxy.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Too many concurrent connections.
    #[error("connection limit reached: {0}")]
    ConnectionLimit(usize),

    /// The upstream could not be reached.
    #[error("upstream {addr} unreachable: {source}")]
    Upstream {
        /// Upstream address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The response stream failed.
    #[error("decrypt error: {0}")]
    Decrypt(#[from] DecryptError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if the error was caused by the client side of the proxy.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidConfig(_) | ServerError::ConnectionLimit(_)
        )
    }

    /// Returns true if the error was caused by the proxy or the upstream.
    pub fn is_server_error(&self) -> bool {
        match self {
            ServerError::Upstream { .. } | ServerError::Io(_) => true,
            ServerError::Decrypt(e) => !e.is_cancelled(),
            _ => false,
        }
    }

    /// Returns true if the connection ended because of a shutdown request.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, ServerError::Decrypt(e) if e.is_cancelled())
    }
}
