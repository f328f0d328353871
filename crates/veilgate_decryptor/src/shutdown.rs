//! Cooperative cancellation.

use crate::error::{DecryptError, DecryptResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A flag shared between a stream and whoever may stop it.
///
/// Clones observe the same flag. The stream checks it between events.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }

    /// Returns true once shutdown was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns `Err(Cancelled)` once shutdown was requested.
    pub fn check(&self) -> DecryptResult<()> {
        if self.is_triggered() {
            Err(DecryptError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(signal.check().is_ok());

        other.trigger();
        assert!(signal.is_triggered());
        assert!(signal.check().unwrap_err().is_cancelled());
    }
}
