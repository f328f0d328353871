//! In-memory key store.

use crate::error::{KeyStoreError, KeyStoreResult};
use crate::names::validate_id;
use crate::provider::{KeyContext, KeyProvider};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use veilgate_crypto::{ContentKey, KeyPair, PrivateKey, PublicKey, ZoneId};

/// A map-backed key store.
///
/// Suitable for:
/// - Unit and integration tests
/// - Embedding Veilgate with keys supplied by the host application
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across streams.
///
/// # Example
///
/// ```rust
/// use veilgate_keystore::{InMemoryKeyStore, KeyContext, KeyProvider};
///
/// let store = InMemoryKeyStore::new();
/// let public = store.generate_client_keys(b"app").unwrap();
/// let private = store.private_key(&KeyContext::Client(b"app")).unwrap();
/// assert_eq!(private.public_key(), public);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    clients: RwLock<HashMap<Vec<u8>, KeyPair>>,
    zones: RwLock<HashMap<Vec<u8>, KeyPair>>,
    poison: RwLock<Option<ContentKey>>,
    failures: AtomicUsize,
}

impl InMemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates and stores a key pair for `client_id`.
    pub fn generate_client_keys(&self, client_id: &[u8]) -> KeyStoreResult<PublicKey> {
        let pair = KeyPair::generate();
        let public = pair.public;
        self.add_client_keys(client_id, pair)?;
        Ok(public)
    }

    /// Stores an existing key pair for `client_id`, replacing any previous one.
    pub fn add_client_keys(&self, client_id: &[u8], pair: KeyPair) -> KeyStoreResult<()> {
        validate_id(client_id)?;
        self.clients.write().insert(client_id.to_vec(), pair);
        Ok(())
    }

    /// Generates a new zone and its key pair.
    pub fn generate_zone_key(&self) -> KeyStoreResult<(ZoneId, PublicKey)> {
        let zone = ZoneId::generate();
        let pair = KeyPair::generate();
        let public = pair.public;
        self.add_zone_keys(&zone, pair);
        Ok((zone, public))
    }

    /// Stores an existing key pair for `zone`.
    pub fn add_zone_keys(&self, zone: &ZoneId, pair: KeyPair) {
        self.zones.write().insert(zone.as_bytes().to_vec(), pair);
    }

    /// Sets the poison key.
    pub fn set_poison_key(&self, key: ContentKey) {
        *self.poison.write() = Some(key);
    }

    /// Makes the next `n` private key lookups fail with a transient error.
    ///
    /// Used to simulate a key store outage.
    pub fn fail_next_lookups(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Number of client key pairs held.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Number of zone key pairs held.
    #[must_use]
    pub fn zone_count(&self) -> usize {
        self.zones.read().len()
    }

    fn lookup(&self, context: &KeyContext<'_>) -> KeyStoreResult<KeyPair> {
        let table = match context {
            KeyContext::Client(_) => self.clients.read(),
            KeyContext::Zone(_) => self.zones.read(),
        };
        table
            .get(context.id())
            .cloned()
            .ok_or_else(|| context.not_found())
    }

    fn take_failure(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl KeyProvider for InMemoryKeyStore {
    fn private_key(&self, context: &KeyContext<'_>) -> KeyStoreResult<PrivateKey> {
        if self.take_failure() {
            return Err(KeyStoreError::unavailable("simulated outage"));
        }
        Ok(self.lookup(context)?.private)
    }

    fn public_key(&self, context: &KeyContext<'_>) -> KeyStoreResult<PublicKey> {
        Ok(self.lookup(context)?.public)
    }

    fn poison_key(&self) -> KeyStoreResult<ContentKey> {
        if let Some(key) = self.poison.read().as_ref() {
            return Ok(key.clone());
        }
        let mut slot = self.poison.write();
        Ok(slot.get_or_insert_with(ContentKey::generate).clone())
    }

    fn has_zone_key(&self, id: &[u8]) -> bool {
        self.zones.read().contains_key(id)
    }
}
