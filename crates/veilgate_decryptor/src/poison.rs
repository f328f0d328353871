//! Poison record callbacks.
//!
//! A poison record is an envelope sealed with the poison key. Nothing
//! legitimate ever reads one, so seeing it in a result stream means somebody
//! is dumping a table. Every registered callback runs on detection.

use crate::shutdown::ShutdownSignal;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Result of a poison callback.
pub type CallbackResult = Result<(), CallbackError>;

/// A poison callback failed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CallbackError {
    /// Description of the failure.
    pub message: String,
}

impl CallbackError {
    /// Creates a callback error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Action run when a poison record is detected.
pub trait PoisonCallback: Send + Sync {
    /// Runs the action. An error ends the stream that saw the record.
    fn call(&self) -> CallbackResult;
}

impl<F> PoisonCallback for F
where
    F: Fn() -> CallbackResult + Send + Sync,
{
    fn call(&self) -> CallbackResult {
        self()
    }
}

/// Ordered set of poison callbacks shared by every stream.
#[derive(Default)]
pub struct PoisonCallbackStorage {
    callbacks: RwLock<Vec<Arc<dyn PoisonCallback>>>,
}

impl PoisonCallbackStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback after the existing ones.
    pub fn add(&self, callback: impl PoisonCallback + 'static) {
        self.callbacks.write().push(Arc::new(callback));
    }

    /// Runs every callback in registration order, stopping at the first
    /// error.
    pub fn call(&self) -> CallbackResult {
        let callbacks = self.callbacks.read().clone();
        for callback in callbacks {
            callback.call()?;
        }
        Ok(())
    }

    /// Returns true if at least one callback is registered.
    #[must_use]
    pub fn has_callbacks(&self) -> bool {
        !self.callbacks.read().is_empty()
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns true if no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_callbacks()
    }
}

impl std::fmt::Debug for PoisonCallbackStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoisonCallbackStorage")
            .field("callbacks", &self.len())
            .finish()
    }
}

/// Triggers a shutdown signal, stopping whatever listens on it.
#[derive(Debug, Clone)]
pub struct StopOnPoison {
    signal: ShutdownSignal,
}

impl StopOnPoison {
    /// Creates a callback that triggers `signal`.
    #[must_use]
    pub fn new(signal: ShutdownSignal) -> Self {
        Self { signal }
    }
}

impl PoisonCallback for StopOnPoison {
    fn call(&self) -> CallbackResult {
        info!("poison record detected, shutting down");
        self.signal.trigger();
        Ok(())
    }
}

/// Runs an external command. A non-zero exit is a failure.
#[derive(Debug, Clone)]
pub struct ScriptCallback {
    program: PathBuf,
    args: Vec<String>,
}

impl ScriptCallback {
    /// Creates a callback that runs `program` without arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl PoisonCallback for ScriptCallback {
    fn call(&self) -> CallbackResult {
        info!(program = %self.program.display(), "running poison script");
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .map_err(|e| CallbackError::new(format!("{}: {e}", self.program.display())))?;
        if status.success() {
            Ok(())
        } else {
            Err(CallbackError::new(format!(
                "{} exited with {status}",
                self.program.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn calls_in_order_and_stops_at_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let storage = PoisonCallbackStorage::new();
        assert!(!storage.has_callbacks());

        for i in 0..3 {
            let log = Arc::clone(&log);
            storage.add(move || {
                log.lock().push(i);
                if i == 1 {
                    Err(CallbackError::new("second failed"))
                } else {
                    Ok(())
                }
            });
        }

        let err = storage.call().unwrap_err();
        assert_eq!(err.message, "second failed");
        assert_eq!(*log.lock(), vec![0, 1]);
        assert_eq!(storage.len(), 3);
    }

    #[test]
    fn stop_on_poison_triggers_signal() {
        let signal = ShutdownSignal::new();
        let storage = PoisonCallbackStorage::new();
        storage.add(StopOnPoison::new(signal.clone()));

        storage.call().unwrap();
        assert!(signal.is_triggered());
    }

    #[test]
    fn missing_script_fails() {
        let callback = ScriptCallback::new("/nonexistent/veilgate-poison-script");
        assert!(callback.call().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn script_exit_status() {
        assert!(ScriptCallback::new("true").call().is_ok());
        assert!(ScriptCallback::new("false").call().is_err());
        assert!(ScriptCallback::new("sh").arg("-c").arg("exit 3").call().is_err());
    }
}
