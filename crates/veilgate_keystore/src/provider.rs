//! Key provider trait definition.

use crate::error::{KeyStoreError, KeyStoreResult};
use std::sync::Arc;
use veilgate_crypto::{ContentKey, PrivateKey, PublicKey};

/// Which owner an envelope key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyContext<'a> {
    /// Envelopes written for a client ID.
    Client(&'a [u8]),
    /// Envelopes written for a zone ID.
    Zone(&'a [u8]),
}

impl<'a> KeyContext<'a> {
    /// The owner ID. Also the associated data of the envelope payload.
    #[must_use]
    pub fn id(&self) -> &'a [u8] {
        match self {
            Self::Client(id) | Self::Zone(id) => id,
        }
    }

    /// Short owner kind for logs and errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Client(_) => "client",
            Self::Zone(_) => "zone",
        }
    }

    pub(crate) fn not_found(&self) -> KeyStoreError {
        KeyStoreError::not_found(self.kind(), self.id())
    }
}

/// Supplies key material to the decryptor.
///
/// # Invariants
///
/// - Implementations synchronize internally; one provider is shared by every
///   stream through an `Arc`
/// - A missing key is `KeyStoreError::NotFound`, never a panic
/// - `has_zone_key` does no more than an existence check
///
/// # Implementors
///
/// - [`super::InMemoryKeyStore`] - For testing and embedding
/// - [`super::FilesystemKeyStore`] - Keys in a key directory
pub trait KeyProvider: Send + Sync {
    /// Returns the private key that opens envelopes for `context`.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no key for the owner, or a store failure.
    fn private_key(&self, context: &KeyContext<'_>) -> KeyStoreResult<PrivateKey>;

    /// Returns the public key envelopes for `context` are wrapped to.
    ///
    /// # Errors
    ///
    /// `NotFound` if there is no key for the owner, or a store failure.
    fn public_key(&self, context: &KeyContext<'_>) -> KeyStoreResult<PublicKey>;

    /// Returns the poison content key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be loaded or created.
    fn poison_key(&self) -> KeyStoreResult<ContentKey>;

    /// Returns true if a private key exists for the zone `id`.
    fn has_zone_key(&self, id: &[u8]) -> bool;
}

impl<T: KeyProvider + ?Sized> KeyProvider for Arc<T> {
    fn private_key(&self, context: &KeyContext<'_>) -> KeyStoreResult<PrivateKey> {
        (**self).private_key(context)
    }

    fn public_key(&self, context: &KeyContext<'_>) -> KeyStoreResult<PublicKey> {
        (**self).public_key(context)
    }

    fn poison_key(&self) -> KeyStoreResult<ContentKey> {
        (**self).poison_key()
    }

    fn has_zone_key(&self, id: &[u8]) -> bool {
        (**self).has_zone_key(id)
    }
}
