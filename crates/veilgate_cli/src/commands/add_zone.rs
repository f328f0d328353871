//! Zone creation.

use super::{CommandResult, KeyDirs};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

/// A new zone as printed by `add-zone`.
#[derive(Debug, Serialize)]
pub struct ZoneInfo {
    /// Zone ID.
    pub id: String,
    /// Zone public key, base64.
    pub public_key: String,
}

/// Generates a zone and stores its keys.
pub fn create(dirs: &KeyDirs) -> CommandResult<ZoneInfo> {
    let store = dirs.open()?;
    let (id, public) = store.generate_zone_key()?;
    Ok(ZoneInfo {
        id: id.to_string(),
        public_key: STANDARD.encode(public.as_bytes()),
    })
}

/// Runs the add-zone command, printing the zone as JSON.
pub fn run(dirs: &KeyDirs) -> CommandResult {
    let zone = create(dirs)?;
    println!("{}", serde_json::to_string(&zone)?);
    Ok(())
}
