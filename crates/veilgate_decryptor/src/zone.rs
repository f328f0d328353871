//! Zone ID recognition for zone mode.

use std::collections::VecDeque;
use tracing::debug;
use veilgate_crypto::{ZoneId, ZONE_ID_LENGTH};
use veilgate_keystore::KeyProvider;

/// Watches the plain stream for known zone IDs.
///
/// Keeps a sliding window over the last [`ZONE_ID_LENGTH`] bytes. A window
/// that is a well-formed zone ID with a key in the provider becomes the
/// active zone, replacing any previous one.
#[derive(Debug, Default)]
pub struct ZoneMatcher {
    window: VecDeque<u8>,
    active: Option<Vec<u8>>,
}

impl ZoneMatcher {
    /// Creates a matcher with no active zone.
    #[must_use]
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(ZONE_ID_LENGTH),
            active: None,
        }
    }

    /// Observes one stream byte. Returns true if it completed a known zone ID.
    pub fn observe(&mut self, byte: u8, keys: &dyn KeyProvider) -> bool {
        if self.window.len() == ZONE_ID_LENGTH {
            self.window.pop_front();
        }
        self.window.push_back(byte);
        if self.window.len() < ZONE_ID_LENGTH {
            return false;
        }

        let candidate = self.window.make_contiguous();
        if !ZoneId::is_well_formed(candidate) || !keys.has_zone_key(candidate) {
            return false;
        }

        debug!(zone_id = %String::from_utf8_lossy(candidate), "zone matched");
        self.active = Some(candidate.to_vec());
        self.window.clear();
        true
    }

    /// The active zone ID, if any.
    #[must_use]
    pub fn active(&self) -> Option<&[u8]> {
        self.active.as_deref()
    }

    /// Returns true if a zone is active.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.active.is_some()
    }

    /// Forgets the active zone and the window.
    pub fn reset(&mut self) {
        self.active = None;
        self.window.clear();
    }
}
