//! # Veilgate Server
//!
//! Decrypting TCP proxy.
//!
//! This crate provides:
//! - A blocking accept loop with a connection limit
//! - Per-connection forwarding: requests go upstream unchanged, responses
//!   come back with every envelope replaced by its plaintext
//! - Shutdown through a [`ShutdownSignal`](veilgate_decryptor::ShutdownSignal),
//!   which a poison callback may trigger
//!
//! # Architecture
//!
//! Each client connection is served by two threads. One copies client bytes
//! to the upstream. The other runs the upstream response stream through a
//! shared [`StreamDecryptor`](veilgate_decryptor::StreamDecryptor) and writes
//! the result to the client. A failure in one connection never affects the
//! others.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod connection;
mod error;
mod server;

pub use config::ServerConfig;
pub use connection::{handle_connection, ConnectionSlot, ProxyContext, ProxyStats};
pub use error::{ServerError, ServerResult};
pub use server::ProxyServer;
