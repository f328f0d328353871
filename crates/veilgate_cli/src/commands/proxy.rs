//! The decrypting proxy.

use super::decrypt::DecryptOptions;
use super::{CommandResult, KeyDirs};
use std::net::SocketAddr;
use std::sync::Arc;
use veilgate_decryptor::ShutdownSignal;
use veilgate_server::{ProxyServer, ServerConfig};

/// Options of the proxy command.
#[derive(Debug, Clone)]
pub struct ProxyOptions {
    /// Listen address.
    pub bind: SocketAddr,
    /// Database address.
    pub upstream: SocketAddr,
    /// Connection limit.
    pub max_connections: usize,
    /// Decryptor options shared with the decrypt command.
    pub decrypt: DecryptOptions,
}

impl ProxyOptions {
    /// The server configuration these options describe.
    pub fn config(&self) -> ServerConfig {
        ServerConfig::new(self.bind, self.upstream)
            .with_max_connections(self.max_connections)
            .with_decryptor(self.decrypt.config())
    }
}

/// Binds the proxy without running it.
pub fn bind(dirs: &KeyDirs, options: &ProxyOptions) -> CommandResult<ProxyServer> {
    let signal = ShutdownSignal::new();
    let callbacks = options.decrypt.poison.callbacks(&signal);
    Ok(ProxyServer::bind_with_signal(
        options.config(),
        Arc::new(dirs.open()?),
        callbacks,
        signal,
    )?)
}

/// Runs the proxy until a poison record stops it or the process ends.
pub fn run(dirs: &KeyDirs, options: &ProxyOptions) -> CommandResult {
    let server = bind(dirs, options)?;
    println!("✓ Proxy listening on {}", server.local_addr()?);
    println!("  Upstream: {}", options.upstream);
    server.run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn binds_to_ephemeral_port() {
        let dir = TempDir::new().unwrap();
        let dirs = KeyDirs {
            private: dir.path().join("keys"),
            public: None,
        };
        let options = ProxyOptions {
            bind: "127.0.0.1:0".parse().unwrap(),
            upstream: "127.0.0.1:5432".parse().unwrap(),
            max_connections: 4,
            decrypt: DecryptOptions {
                client_id: Some("app".into()),
                ..DecryptOptions::default()
            },
        };
        let server = bind(&dirs, &options).unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let invalid = ProxyOptions {
            max_connections: 0,
            ..options
        };
        assert!(bind(&dirs, &invalid).is_err());
    }
}
