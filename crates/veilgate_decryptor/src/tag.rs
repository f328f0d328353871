//! Incremental begin tag matcher.

use veilgate_crypto::TAG_BEGIN;

const TAG_LEN: usize = TAG_BEGIN.len();

/// Outcome of feeding one byte to the [`TagMatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The byte extended a partial match.
    Partial,
    /// The byte completed the tag.
    FullMatch,
    /// The byte does not continue the tag. The matcher still holds the
    /// bytes matched before it; the caller takes them and feeds the byte
    /// again.
    Mismatch,
}

/// Matches [`TAG_BEGIN`] one byte at a time.
#[derive(Debug, Default)]
pub struct TagMatcher {
    matched: Vec<u8>,
}

impl TagMatcher {
    /// Creates a matcher with nothing matched.
    #[must_use]
    pub fn new() -> Self {
        Self {
            matched: Vec::with_capacity(TAG_LEN),
        }
    }

    /// Offers the next byte.
    pub fn feed(&mut self, byte: u8) -> MatchOutcome {
        if self.matched.len() >= TAG_LEN || byte != TAG_BEGIN[self.matched.len()] {
            return MatchOutcome::Mismatch;
        }
        self.matched.push(byte);
        if self.matched.len() == TAG_LEN {
            MatchOutcome::FullMatch
        } else {
            MatchOutcome::Partial
        }
    }

    /// Bytes matched so far.
    #[must_use]
    pub fn matched_bytes(&self) -> &[u8] {
        &self.matched
    }

    /// Number of bytes matched so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.matched.len()
    }

    /// Returns the matched bytes and resets.
    pub fn take_matched(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.matched, Vec::with_capacity(TAG_LEN))
    }

    /// Clears position and buffer.
    pub fn reset(&mut self) {
        self.matched.clear();
    }
}
