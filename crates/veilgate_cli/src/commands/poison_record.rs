//! Poison record generation.

use super::{write_data, CommandResult, KeyDirs};
use std::path::Path;
use veilgate_crypto::create_poison_record;
use veilgate_keystore::{KeyContext, KeyProvider};

/// Creates a poison record for `client_id` carrying `data_len` random bytes.
///
/// The poison key is created on first use.
pub fn create(dirs: &KeyDirs, client_id: &str, data_len: usize) -> CommandResult<Vec<u8>> {
    let store = dirs.open()?;
    let public = store.public_key(&KeyContext::Client(client_id.as_bytes()))?;
    let poison = store.poison_key()?;
    Ok(create_poison_record(
        &poison,
        &public,
        client_id.as_bytes(),
        data_len,
    )?)
}

/// Runs the poison-record command.
pub fn run(
    dirs: &KeyDirs,
    client_id: &str,
    data_len: usize,
    output: Option<&Path>,
    base64: bool,
) -> CommandResult {
    let record = create(dirs, client_id, data_len)?;
    write_data(output, &record, base64)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use veilgate_decryptor::{DecryptorConfig, PoisonCallbackStorage, StreamDecryptor};

    #[test]
    fn record_trips_the_decryptor() {
        let dir = TempDir::new().unwrap();
        let dirs = KeyDirs {
            private: dir.path().join("keys"),
            public: None,
        };
        dirs.open().unwrap().generate_client_keys(b"app").unwrap();
        let record = create(&dirs, "app", 24).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let callbacks = Arc::new(PoisonCallbackStorage::new());
        let counter = Arc::clone(&hits);
        callbacks.add(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let decryptor =
            StreamDecryptor::new(DecryptorConfig::new("app"), Arc::new(dirs.open().unwrap()))
                .unwrap()
                .with_callbacks(callbacks);

        assert_eq!(decryptor.decrypt_bytes(&record).unwrap(), record);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
