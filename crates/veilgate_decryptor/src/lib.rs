//! # Veilgate Decryptor
//!
//! Streaming envelope recognizer and decryptor.
//!
//! A [`StreamDecryptor`] consumes a byte stream (for example the result rows
//! coming back from a database), finds encrypted envelopes embedded in it,
//! decrypts them in place and forwards every other byte unchanged.
//!
//! ## Guarantees
//!
//! - Every input byte that is not part of a genuine envelope appears in the
//!   output exactly once and in order
//! - A begin tag inside ordinary data never hides a real envelope that
//!   starts within it
//! - A poison record runs the poison callbacks exactly once and is passed
//!   through undecrypted
//! - Key, I/O and callback failures end only the affected stream
//!
//! ## Components
//!
//! - [`TagMatcher`] - incremental begin tag matching
//! - [`ZoneMatcher`] - zone ID recognition in zone mode
//! - [`ScanSession`] - the per-stream driver and replay controller
//! - [`PoisonCallbackStorage`] - actions run on poison detection

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod input;
mod poison;
mod reader;
mod scanner;
mod shutdown;
mod tag;
mod zone;

pub use config::{DecryptorConfig, DEFAULT_MAX_PAYLOAD_LEN};
pub use error::{DecryptError, DecryptResult};
pub use poison::{
    CallbackError, CallbackResult, PoisonCallback, PoisonCallbackStorage, ScriptCallback,
    StopOnPoison,
};
pub use scanner::{ScanEvent, ScanSession, ScanState, ScanStats, StreamDecryptor};
pub use shutdown::ShutdownSignal;
pub use tag::{MatchOutcome, TagMatcher};
pub use zone::ZoneMatcher;
