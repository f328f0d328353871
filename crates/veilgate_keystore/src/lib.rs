//! # Veilgate Keystore
//!
//! Key provider trait and key stores for Veilgate.
//!
//! The decryptor never touches key files itself. It asks a [`KeyProvider`]
//! for the private key of the client or zone an envelope was written for,
//! for the poison key, and whether a zone ID is known.
//!
//! ## Available Stores
//!
//! - [`InMemoryKeyStore`] - Map-backed, for tests and embedding
//! - [`FilesystemKeyStore`] - Keys in a key directory, with a bounded cache

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod error;
mod file;
mod memory;
mod names;
mod provider;

pub use cache::CacheSize;
pub use error::{KeyStoreError, KeyStoreResult};
pub use file::{FilesystemKeyStore, FilesystemKeyStoreBuilder};
pub use memory::InMemoryKeyStore;
pub use names::{validate_id, MAX_ID_LENGTH, POISON_KEY_FILENAME};
pub use provider::{KeyContext, KeyProvider};
