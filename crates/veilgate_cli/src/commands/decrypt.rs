//! Stream decryption of files or stdin.

use super::{open_input, open_output, CommandResult, KeyDirs, PoisonActions};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use veilgate_decryptor::{DecryptorConfig, ShutdownSignal, StreamDecryptor};

/// Options of the decrypt command.
#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    /// Client ID for envelopes outside zones.
    pub client_id: Option<String>,
    /// Only decrypt envelopes that follow a zone ID.
    pub zone_mode: bool,
    /// Skip the poison key comparison.
    pub no_poison_check: bool,
    /// Payload length cap.
    pub max_payload_len: Option<u64>,
    /// Reactions to poison records.
    pub poison: PoisonActions,
}

impl DecryptOptions {
    /// The decryptor configuration these options describe.
    pub fn config(&self) -> DecryptorConfig {
        let mut config = DecryptorConfig::new(self.client_id.clone().unwrap_or_default())
            .zone_mode(self.zone_mode)
            .check_poison(!self.no_poison_check);
        if let Some(len) = self.max_payload_len {
            config = config.max_payload_len(len);
        }
        config
    }
}

/// Runs the decrypt command.
pub fn run(
    dirs: &KeyDirs,
    options: &DecryptOptions,
    input: Option<&Path>,
    output: Option<&Path>,
) -> CommandResult {
    let signal = ShutdownSignal::new();
    let decryptor = StreamDecryptor::new(options.config(), Arc::new(dirs.open()?))?
        .with_callbacks(options.poison.callbacks(&signal));

    let stats = decryptor.decrypt_stream(open_input(input)?, open_output(output)?, &signal)?;
    info!(
        decrypted = stats.decrypted,
        plain_bytes = stats.plain_bytes,
        fake_matches = stats.fake_matches,
        poison_records = stats.poison_records,
        "decryption finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use veilgate_crypto::create_envelope;

    #[test]
    fn decrypts_file() {
        let dir = TempDir::new().unwrap();
        let dirs = KeyDirs {
            private: dir.path().join("keys"),
            public: None,
        };
        let public = dirs.open().unwrap().generate_client_keys(b"app").unwrap();

        let mut dump = b"INSERT INTO t VALUES ('".to_vec();
        dump.extend(create_envelope(&public, b"app", b"secret").unwrap());
        dump.extend_from_slice(b"');\n");
        let input = dir.path().join("dump.sql");
        let output = dir.path().join("plain.sql");
        fs::write(&input, &dump).unwrap();

        let options = DecryptOptions {
            client_id: Some("app".into()),
            ..DecryptOptions::default()
        };
        run(&dirs, &options, Some(&input), Some(&output)).unwrap();
        assert_eq!(
            fs::read(&output).unwrap(),
            b"INSERT INTO t VALUES ('secret');\n"
        );
    }

    #[test]
    fn poison_shutdown_cancels() {
        let dir = TempDir::new().unwrap();
        let dirs = KeyDirs {
            private: dir.path().join("keys"),
            public: None,
        };
        dirs.open().unwrap().generate_client_keys(b"app").unwrap();
        let record = crate::commands::poison_record::create(&dirs, "app", 8).unwrap();
        let input = dir.path().join("in");
        fs::write(&input, &record).unwrap();

        let options = DecryptOptions {
            client_id: Some("app".into()),
            poison: PoisonActions {
                script: None,
                shutdown: true,
            },
            ..DecryptOptions::default()
        };
        let output = dir.path().join("out");
        assert!(run(&dirs, &options, Some(&input), Some(&output)).is_err());
    }

    #[test]
    fn missing_client_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dirs = KeyDirs {
            private: dir.path().join("keys"),
            public: None,
        };
        let input = dir.path().join("in");
        fs::write(&input, b"x").unwrap();
        assert!(run(&dirs, &DecryptOptions::default(), Some(&input), None).is_err());
    }
}
