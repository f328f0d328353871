//! Proxy configuration.

use crate::error::{ServerError, ServerResult};
use std::net::SocketAddr;
use std::time::Duration;
use veilgate_decryptor::DecryptorConfig;

/// Configuration for the decrypting proxy.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the proxy listens on.
    pub bind_addr: SocketAddr,
    /// Database server each client connection is forwarded to.
    pub upstream_addr: SocketAddr,
    /// Maximum concurrent client connections.
    pub max_connections: usize,
    /// Timeout for connecting to the upstream.
    pub connect_timeout: Duration,
    /// How often the accept loop checks for shutdown.
    pub poll_interval: Duration,
    /// Decryptor settings applied to every upstream response stream.
    pub decryptor: DecryptorConfig,
}

impl ServerConfig {
    /// Creates a configuration forwarding `bind_addr` to `upstream_addr`.
    pub fn new(bind_addr: SocketAddr, upstream_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            upstream_addr,
            max_connections: 1000,
            connect_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            decryptor: DecryptorConfig::default(),
        }
    }

    /// Sets the maximum concurrent connections.
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the upstream connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the accept loop poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the decryptor configuration.
    #[must_use]
    pub fn with_decryptor(mut self, decryptor: DecryptorConfig) -> Self {
        self.decryptor = decryptor;
        self
    }

    /// Checks the configuration before binding.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a zero connection limit, zero timeouts or
    /// an invalid decryptor configuration.
    pub fn validate(&self) -> ServerResult<()> {
        if self.max_connections == 0 {
            return Err(ServerError::InvalidConfig(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.connect_timeout.is_zero() || self.poll_interval.is_zero() {
            return Err(ServerError::InvalidConfig(
                "timeouts must be non-zero".into(),
            ));
        }
        self.decryptor
            .validate()
            .map_err(|e| ServerError::InvalidConfig(e.to_string()))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(
            SocketAddr::from(([127, 0, 0, 1], 9393)),
            SocketAddr::from(([127, 0, 0, 1], 5432)),
        )
    }
}
