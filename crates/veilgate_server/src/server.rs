//! Accept loop of the decrypting proxy.

use crate::config::ServerConfig;
use crate::connection::{handle_connection, ProxyContext, ProxyStats};
use crate::error::{ServerError, ServerResult};
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use veilgate_decryptor::{PoisonCallbackStorage, ShutdownSignal, StreamDecryptor};
use veilgate_keystore::KeyProvider;

/// The decrypting proxy.
///
/// Sits between database clients and the database. Requests are forwarded
/// unchanged; envelopes in responses are replaced by their plaintext.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use veilgate_decryptor::DecryptorConfig;
/// use veilgate_keystore::FilesystemKeyStore;
/// use veilgate_server::{ProxyServer, ServerConfig};
///
/// let keys = FilesystemKeyStore::open("/etc/veilgate/keys").unwrap();
/// let config = ServerConfig::new(
///     "127.0.0.1:9393".parse().unwrap(),
///     "127.0.0.1:5432".parse().unwrap(),
/// )
/// .with_decryptor(DecryptorConfig::new("app"));
///
/// let server = ProxyServer::bind(config, Arc::new(keys)).unwrap();
/// server.run().unwrap();
/// ```
pub struct ProxyServer {
    listener: TcpListener,
    context: Arc<ProxyContext>,
}

impl ProxyServer {
    /// Validates `config` and binds the listening socket.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` or the bind failure.
    pub fn bind(config: ServerConfig, keys: Arc<dyn KeyProvider>) -> ServerResult<Self> {
        Self::bind_with_callbacks(config, keys, Arc::new(PoisonCallbackStorage::new()))
    }

    /// Like [`bind`](Self::bind), running `callbacks` on poison records.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` or the bind failure.
    pub fn bind_with_callbacks(
        config: ServerConfig,
        keys: Arc<dyn KeyProvider>,
        callbacks: Arc<PoisonCallbackStorage>,
    ) -> ServerResult<Self> {
        Self::bind_with_signal(config, keys, callbacks, ShutdownSignal::new())
    }

    /// Like [`bind_with_callbacks`](Self::bind_with_callbacks), stopping
    /// when `shutdown` is triggered.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` or the bind failure.
    pub fn bind_with_signal(
        config: ServerConfig,
        keys: Arc<dyn KeyProvider>,
        callbacks: Arc<PoisonCallbackStorage>,
        shutdown: ShutdownSignal,
    ) -> ServerResult<Self> {
        config.validate()?;
        let decryptor = StreamDecryptor::new(config.decryptor.clone(), keys)?
            .with_callbacks(callbacks);
        let listener = TcpListener::bind(config.bind_addr)?;
        listener.set_nonblocking(true)?;
        info!(
            bind = %listener.local_addr()?,
            upstream = %config.upstream_addr,
            zone_mode = config.decryptor.zone_mode,
            "proxy listening"
        );
        Ok(Self {
            listener,
            context: Arc::new(ProxyContext::new(config, decryptor, shutdown)),
        })
    }

    /// Address the proxy listens on.
    ///
    /// # Errors
    ///
    /// The socket error, if any.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Signal that stops [`run`](Self::run).
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.context.shutdown.clone()
    }

    /// Counters across all connections.
    pub fn stats(&self) -> ProxyStats {
        self.context.stats()
    }

    /// Number of connections being served.
    pub fn active_connections(&self) -> usize {
        self.context.active_connections()
    }

    /// Accepts and serves connections until the shutdown signal fires.
    ///
    /// On shutdown, live connections are closed and their threads joined.
    ///
    /// # Errors
    ///
    /// Accept failures other than timeouts.
    pub fn run(&self) -> ServerResult<()> {
        let mut workers: Vec<JoinHandle<()>> = Vec::new();
        let result = self.accept_loop(&mut workers);

        self.context.shutdown.trigger();
        self.context.close_all();
        for worker in workers {
            if worker.join().is_err() {
                error!("connection thread panicked");
            }
        }
        info!(stats = ?self.context.stats(), "proxy stopped");
        result
    }

    fn accept_loop(&self, workers: &mut Vec<JoinHandle<()>>) -> ServerResult<()> {
        while !self.context.shutdown.is_triggered() {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.context.config.poll_interval);
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    return Err(ServerError::Io(e));
                }
            };
            workers.retain(|worker| !worker.is_finished());

            let slot = match self.context.acquire() {
                Ok(slot) => slot,
                Err(e) => {
                    warn!(%peer, error = %e, "connection refused");
                    let _ = stream.shutdown(Shutdown::Both);
                    continue;
                }
            };
            // accepted sockets inherit non-blocking mode on some platforms
            stream.set_nonblocking(false)?;

            let id = Uuid::new_v4();
            debug!(%peer, connection = %id, "accepted");
            workers.push(thread::spawn(move || {
                // outcomes are logged and counted inside
                let _ = handle_connection(slot.context(), id, stream);
            }));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyServer")
            .field("listener", &self.listener)
            .field("context", &self.context)
            .finish()
    }
}
