//! Envelope creation.

use super::{open_input, write_data, CommandResult, KeyDirs};
use std::io::Read;
use std::path::Path;
use veilgate_crypto::{create_envelope, ZoneId};
use veilgate_keystore::{KeyContext, KeyProvider};

/// Whose public key seals the envelope.
#[derive(Debug, Clone)]
pub enum Recipient {
    /// A client ID.
    Client(String),
    /// A zone ID.
    Zone(ZoneId),
}

/// Seals `plaintext` for `recipient`.
///
/// Zone envelopes are preceded by their zone ID so that a zone-mode
/// decryptor picks them up.
pub fn seal(dirs: &KeyDirs, recipient: &Recipient, plaintext: &[u8]) -> CommandResult<Vec<u8>> {
    let store = dirs.open()?;
    let sealed = match recipient {
        Recipient::Client(id) => {
            let public = store.public_key(&KeyContext::Client(id.as_bytes()))?;
            create_envelope(&public, id.as_bytes(), plaintext)?
        }
        Recipient::Zone(zone) => {
            let public = store.public_key(&KeyContext::Zone(zone.as_bytes()))?;
            let mut out = zone.as_bytes().to_vec();
            out.extend(create_envelope(&public, zone.as_bytes(), plaintext)?);
            out
        }
    };
    Ok(sealed)
}

/// Runs the encrypt command.
pub fn run(
    dirs: &KeyDirs,
    recipient: &Recipient,
    input: Option<&Path>,
    output: Option<&Path>,
    base64: bool,
) -> CommandResult {
    let mut plaintext = Vec::new();
    open_input(input)?.read_to_end(&mut plaintext)?;
    let sealed = seal(dirs, recipient, &plaintext)?;
    write_data(output, &sealed, base64)?;
    Ok(())
}
