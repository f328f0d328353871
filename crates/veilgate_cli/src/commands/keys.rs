//! Client key generation.

use super::{CommandResult, KeyDirs};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use veilgate_keystore::validate_id;

/// Generated client key pair, public half only.
#[derive(Debug, Serialize)]
pub struct ClientKeyInfo {
    /// Client ID.
    pub client_id: String,
    /// Public key, base64.
    pub public_key: String,
    /// Public key fingerprint.
    pub fingerprint: String,
}

/// Generates and stores a key pair for `client_id`.
pub fn generate(dirs: &KeyDirs, client_id: &str) -> CommandResult<ClientKeyInfo> {
    validate_id(client_id.as_bytes())?;
    let store = dirs.open()?;
    let public = store.generate_client_keys(client_id.as_bytes())?;
    Ok(ClientKeyInfo {
        client_id: client_id.to_string(),
        public_key: STANDARD.encode(public.as_bytes()),
        fingerprint: public.fingerprint(),
    })
}

/// Runs the keys command.
pub fn run(dirs: &KeyDirs, client_id: &str, format: &str) -> CommandResult {
    let info = generate(dirs, client_id)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&info)?),
        _ => {
            println!("✓ Keys generated for {}", info.client_id);
            println!("  Directory: {}", dirs.private.display());
            println!("  Public key: {}", info.public_key);
            println!("  Fingerprint: {}", info.fingerprint);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use veilgate_keystore::{KeyContext, KeyProvider};

    #[test]
    fn generated_keys_are_stored() {
        let dir = TempDir::new().unwrap();
        let dirs = KeyDirs {
            private: dir.path().join("keys"),
            public: None,
        };
        let info = generate(&dirs, "billing").unwrap();

        let store = dirs.open().unwrap();
        let public = store.public_key(&KeyContext::Client(b"billing")).unwrap();
        assert_eq!(info.fingerprint, public.fingerprint());
        assert!(generate(&dirs, "../escape").is_err());
    }
}
