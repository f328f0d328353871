//! Key fixtures and stream builders.

use std::sync::Arc;
use tempfile::TempDir;
use veilgate_crypto::{
    create_envelope, create_poison_record, KeyPair, PublicKey, ZoneId,
};
use veilgate_keystore::{FilesystemKeyStore, InMemoryKeyStore, KeyProvider};

/// Client ID used by [`TestKeys`].
pub const TEST_CLIENT_ID: &[u8] = b"test_client";

/// An in-memory key store with one client and one zone.
pub struct TestKeys {
    /// The store.
    pub store: Arc<InMemoryKeyStore>,
    /// Public key of [`TEST_CLIENT_ID`].
    pub client_public: PublicKey,
    /// The zone.
    pub zone: ZoneId,
    /// Public key of the zone.
    pub zone_public: PublicKey,
}

impl TestKeys {
    /// Generates fresh keys.
    pub fn new() -> Self {
        let store = InMemoryKeyStore::new();
        let client_public = store
            .generate_client_keys(TEST_CLIENT_ID)
            .expect("Failed to generate client keys");
        let (zone, zone_public) = store
            .generate_zone_key()
            .expect("Failed to generate zone key");
        Self {
            store: Arc::new(store),
            client_public,
            zone,
            zone_public,
        }
    }

    /// The store as a shared provider.
    pub fn provider(&self) -> Arc<dyn KeyProvider> {
        self.store.clone()
    }

    /// An envelope for the test client.
    pub fn envelope(&self, plaintext: &[u8]) -> Vec<u8> {
        create_envelope(&self.client_public, TEST_CLIENT_ID, plaintext)
            .expect("Failed to create envelope")
    }

    /// An envelope for the test zone (without the zone ID in front).
    pub fn zone_envelope(&self, plaintext: &[u8]) -> Vec<u8> {
        create_envelope(&self.zone_public, self.zone.as_bytes(), plaintext)
            .expect("Failed to create zone envelope")
    }

    /// An envelope sealed to a key the store does not hold.
    pub fn foreign_envelope(&self, plaintext: &[u8]) -> Vec<u8> {
        let stranger = KeyPair::generate();
        create_envelope(&stranger.public, TEST_CLIENT_ID, plaintext)
            .expect("Failed to create envelope")
    }

    /// A poison record for the test client.
    pub fn poison_record(&self, data_len: usize) -> Vec<u8> {
        let poison = self.store.poison_key().expect("Failed to get poison key");
        create_poison_record(&poison, &self.client_public, TEST_CLIENT_ID, data_len)
            .expect("Failed to create poison record")
    }
}

impl Default for TestKeys {
    fn default() -> Self {
        Self::new()
    }
}

/// A filesystem key store in a temporary directory.
pub struct TestKeyDir {
    /// The store.
    pub store: FilesystemKeyStore,
    /// The temporary directory (kept alive to prevent cleanup).
    pub dir: TempDir,
}

impl TestKeyDir {
    /// Creates an empty key directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = FilesystemKeyStore::open(dir.path().join("keys"))
            .expect("Failed to open key store");
        Self { store, dir }
    }
}

impl Default for TestKeyDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds an input stream together with the output the decryptor must
/// produce for it.
#[derive(Debug, Clone, Default)]
pub struct StreamCase {
    /// Bytes fed to the decryptor.
    pub input: Vec<u8>,
    /// Bytes the decryptor must write.
    pub expected: Vec<u8>,
}

impl StreamCase {
    /// Starts an empty case.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends bytes that pass through unchanged.
    pub fn plain(mut self, bytes: &[u8]) -> Self {
        self.input.extend_from_slice(bytes);
        self.expected.extend_from_slice(bytes);
        self
    }

    /// Appends an envelope that decrypts to `plaintext`.
    pub fn secret(mut self, keys: &TestKeys, plaintext: &[u8]) -> Self {
        self.input.extend(keys.envelope(plaintext));
        self.expected.extend_from_slice(plaintext);
        self
    }

    /// Appends the test zone ID and an envelope for it.
    pub fn zone_secret(mut self, keys: &TestKeys, plaintext: &[u8]) -> Self {
        self.input.extend_from_slice(keys.zone.as_bytes());
        self.input.extend(keys.zone_envelope(plaintext));
        self.expected.extend_from_slice(keys.zone.as_bytes());
        self.expected.extend_from_slice(plaintext);
        self
    }
}
