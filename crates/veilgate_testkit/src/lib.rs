//! # Veilgate Testkit
//!
//! Test utilities for Veilgate.
//!
//! This crate provides:
//! - Key fixtures (in-memory and temporary filesystem key stores)
//! - Stream builders that track the expected decryptor output
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use veilgate_testkit::prelude::*;
//!
//! let keys = TestKeys::new();
//! let case = StreamCase::new().plain(b"id=").secret(&keys, b"42");
//! assert_eq!(case.expected, b"id=42");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
