//! Per-connection forwarding.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;
use veilgate_decryptor::{ScanStats, ShutdownSignal, StreamDecryptor};

/// Counters across all connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyStats {
    /// Connections accepted and forwarded.
    pub accepted: u64,
    /// Connections refused at the connection limit.
    pub rejected: u64,
    /// Envelopes decrypted on finished connections.
    pub decrypted: u64,
    /// Poison records seen on finished connections.
    pub poison_records: u64,
    /// Connections that ended with an error other than shutdown.
    pub failed: u64,
}

/// State shared by the accept loop and every connection.
pub struct ProxyContext {
    /// Proxy configuration.
    pub config: ServerConfig,
    /// Decryptor shared by all response streams.
    pub decryptor: StreamDecryptor,
    /// Stops the accept loop and every stream.
    pub shutdown: ShutdownSignal,
    active: AtomicUsize,
    accepted: AtomicU64,
    rejected: AtomicU64,
    decrypted: AtomicU64,
    poison_records: AtomicU64,
    failed: AtomicU64,
    // upstream sockets of live connections, closed on shutdown
    upstreams: Mutex<HashMap<Uuid, TcpStream>>,
}

impl ProxyContext {
    /// Creates a context.
    pub fn new(config: ServerConfig, decryptor: StreamDecryptor, shutdown: ShutdownSignal) -> Self {
        Self {
            config,
            decryptor,
            shutdown,
            active: AtomicUsize::new(0),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            decrypted: AtomicU64::new(0),
            poison_records: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            upstreams: Mutex::new(HashMap::new()),
        }
    }

    /// Number of connections being served.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ProxyStats {
        ProxyStats {
            accepted: self.accepted.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            decrypted: self.decrypted.load(Ordering::SeqCst),
            poison_records: self.poison_records.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Claims a connection slot.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionLimit` when every slot is taken.
    pub fn acquire(self: &Arc<Self>) -> ServerResult<ConnectionSlot> {
        let max = self.config.max_connections;
        let claimed = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok();
        if claimed {
            self.accepted.fetch_add(1, Ordering::SeqCst);
            Ok(ConnectionSlot {
                context: Arc::clone(self),
            })
        } else {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            Err(ServerError::ConnectionLimit(max))
        }
    }

    /// Closes every live upstream socket, unblocking their streams.
    pub fn close_all(&self) {
        let upstreams: Vec<_> = self.upstreams.lock().drain().collect();
        for (id, stream) in upstreams {
            debug!(connection = %id, "closing upstream");
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn register(&self, id: Uuid, upstream: &TcpStream) -> io::Result<()> {
        let handle = upstream.try_clone()?;
        self.upstreams.lock().insert(id, handle);
        // close_all may have run before the insert
        if self.shutdown.is_triggered() {
            self.close_all();
        }
        Ok(())
    }

    fn unregister(&self, id: &Uuid) {
        self.upstreams.lock().remove(id);
    }

    fn record(&self, stats: &ScanStats) {
        self.decrypted.fetch_add(stats.decrypted, Ordering::SeqCst);
        self.poison_records
            .fetch_add(stats.poison_records, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for ProxyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyContext")
            .field("config", &self.config)
            .field("active", &self.active_connections())
            .finish_non_exhaustive()
    }
}

/// A claimed connection slot, released on drop.
#[derive(Debug)]
pub struct ConnectionSlot {
    context: Arc<ProxyContext>,
}

impl ConnectionSlot {
    /// The context the slot belongs to.
    pub fn context(&self) -> &ProxyContext {
        &self.context
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.context.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serves one client connection until either side closes it.
///
/// Client bytes are copied to the upstream unchanged on a helper thread.
/// Upstream bytes go through the decryptor on the calling thread.
///
/// # Errors
///
/// Upstream connect failures and fatal response stream errors.
pub fn handle_connection(
    context: &ProxyContext,
    id: Uuid,
    client: TcpStream,
) -> ServerResult<ScanStats> {
    let span = info_span!("connection", id = %id);
    let _entered = span.enter();

    let result = serve(context, id, &client);
    let _ = client.shutdown(Shutdown::Both);

    match &result {
        Ok(stats) => {
            context.record(stats);
            info!(
                decrypted = stats.decrypted,
                plain_bytes = stats.plain_bytes,
                "connection closed"
            );
        }
        Err(e) if e.is_shutdown() => info!("connection closed by shutdown"),
        Err(e) => {
            context.failed.fetch_add(1, Ordering::SeqCst);
            warn!(error = %e, "connection failed");
        }
    }
    result
}

fn serve(context: &ProxyContext, id: Uuid, client: &TcpStream) -> ServerResult<ScanStats> {
    let peer = client.peer_addr().ok();
    let addr = context.config.upstream_addr;
    let upstream = TcpStream::connect_timeout(&addr, context.config.connect_timeout)
        .map_err(|source| ServerError::Upstream { addr, source })?;
    info!(?peer, upstream = %addr, "connection opened");

    let result = context
        .register(id, &upstream)
        .map_err(ServerError::from)
        .and_then(|()| forward(context, client, &upstream));
    context.unregister(&id);
    let _ = upstream.shutdown(Shutdown::Both);
    result
}

fn forward(
    context: &ProxyContext,
    client: &TcpStream,
    upstream: &TcpStream,
) -> ServerResult<ScanStats> {
    let mut requests = client.try_clone()?;
    let mut to_upstream = upstream.try_clone()?;
    let span = tracing::Span::current();
    let pump = thread::spawn(move || {
        let _entered = span.enter();
        let copied = io::copy(&mut requests, &mut to_upstream);
        let _ = to_upstream.shutdown(Shutdown::Write);
        match copied {
            Ok(n) => debug!(bytes = n, "client stream finished"),
            Err(e) => debug!(error = %e, "client stream ended"),
        }
    });

    let result = context
        .decryptor
        .decrypt_stream(upstream, client, &context.shutdown);

    // the pump blocks on the client until it goes away
    let _ = client.shutdown(Shutdown::Both);
    if pump.join().is_err() {
        warn!("client stream thread panicked");
    }
    result.map_err(ServerError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilgate_decryptor::DecryptorConfig;
    use veilgate_keystore::InMemoryKeyStore;

    fn context(config: ServerConfig) -> Arc<ProxyContext> {
        let decryptor =
            StreamDecryptor::new(DecryptorConfig::new("app"), Arc::new(InMemoryKeyStore::new()))
                .unwrap();
        Arc::new(ProxyContext::new(config, decryptor, ShutdownSignal::new()))
    }

    #[test]
    fn slots_are_limited_and_released() {
        let context = context(ServerConfig::default().with_max_connections(2));
        let a = context.acquire().unwrap();
        let _b = context.acquire().unwrap();
        assert!(matches!(
            context.acquire(),
            Err(ServerError::ConnectionLimit(2))
        ));
        assert_eq!(context.active_connections(), 2);

        drop(a);
        assert_eq!(context.active_connections(), 1);
        assert!(context.acquire().is_ok());

        let stats = context.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn unreachable_upstream() {
        let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);
        let mut config = ServerConfig::default();
        config.upstream_addr = dead_addr;
        let context = context(config);

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        let err = handle_connection(&context, Uuid::new_v4(), client).unwrap_err();
        assert!(matches!(err, ServerError::Upstream { .. }));
        assert!(err.is_server_error());
        assert_eq!(context.active_connections(), 0);
        assert_eq!(context.stats().failed, 1);
    }
}
