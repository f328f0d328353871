//! CLI command implementations.

pub mod add_zone;
pub mod decrypt;
pub mod encrypt;
pub mod keys;
pub mod poison_record;
pub mod proxy;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use veilgate_decryptor::{PoisonCallbackStorage, ScriptCallback, ShutdownSignal, StopOnPoison};
use veilgate_keystore::{FilesystemKeyStore, KeyStoreResult};

/// Result type of every command.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Where keys live.
#[derive(Debug, Clone)]
pub struct KeyDirs {
    /// Directory of private keys (and public keys unless `public` is set).
    pub private: PathBuf,
    /// Separate directory of public keys.
    pub public: Option<PathBuf>,
}

impl KeyDirs {
    /// Opens the key store, creating the directories if needed.
    pub fn open(&self) -> KeyStoreResult<FilesystemKeyStore> {
        let builder = FilesystemKeyStore::builder();
        let builder = match &self.public {
            Some(public) => builder.key_directories(&self.private, public),
            None => builder.key_directory(&self.private),
        };
        builder.build()
    }
}

/// Poison reactions chosen on the command line.
#[derive(Debug, Clone, Default)]
pub struct PoisonActions {
    /// Script run on detection.
    pub script: Option<PathBuf>,
    /// Stop the process on detection.
    pub shutdown: bool,
}

impl PoisonActions {
    /// Builds the callbacks. The stop action triggers `signal`.
    pub fn callbacks(&self, signal: &ShutdownSignal) -> Arc<PoisonCallbackStorage> {
        let storage = PoisonCallbackStorage::new();
        if let Some(script) = &self.script {
            storage.add(ScriptCallback::new(script));
        }
        if self.shutdown {
            storage.add(StopOnPoison::new(signal.clone()));
        }
        Arc::new(storage)
    }
}

/// Opens `path`, or stdin when absent.
pub fn open_input(path: Option<&Path>) -> io::Result<Box<dyn Read>> {
    Ok(match path {
        Some(path) => Box::new(fs::File::open(path)?),
        None => Box::new(io::stdin().lock()),
    })
}

/// Creates `path`, or uses stdout when absent.
pub fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    })
}

/// Writes binary data, base64 encoded with a trailing newline if asked.
pub fn write_data(output: Option<&Path>, data: &[u8], base64: bool) -> io::Result<()> {
    let mut out = open_output(output)?;
    if base64 {
        writeln!(out, "{}", STANDARD.encode(data))?;
    } else {
        out.write_all(data)?;
    }
    out.flush()
}
