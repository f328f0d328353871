//! Stream driver: finds envelopes in a byte stream and decrypts them in place.
//!
//! Every byte goes through the zone matcher (zone mode only) and the tag
//! matcher. A full tag match starts an envelope attempt:
//!
//! 1. fetch the private key for the active client or zone
//! 2. read and unwrap the key block
//! 3. compare the content key against the poison key
//! 4. read the length-prefixed payload and decrypt it
//!
//! Any attempt that fails for data reasons is a fake envelope. Its first
//! byte is emitted as plain output and the rest is pushed back in front of
//! the live stream, so a real envelope that starts inside the false match is
//! still found. Each replay emits at least one byte, so recovery terminates.

use crate::config::DecryptorConfig;
use crate::error::{DecryptError, DecryptResult};
use crate::input::ScanInput;
use crate::poison::PoisonCallbackStorage;
use crate::reader::EnvelopeReader;
use crate::shutdown::ShutdownSignal;
use crate::tag::{MatchOutcome, TagMatcher};
use crate::zone::ZoneMatcher;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use veilgate_crypto::{decrypt_payload, unwrap_content_key, ContentKey, PrivateKey};
use veilgate_keystore::{KeyContext, KeyProvider, KeyStoreResult};

/// What the driver is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Passing plain bytes through.
    Scanning,
    /// Holding a partial tag match.
    TagMatching,
    /// Reading the key block or the payload of a candidate.
    EnvelopeReading,
    /// Opening the key block.
    KeyUnwrapping,
    /// Decrypting the payload.
    PayloadDecrypting,
    /// Handing out a decrypted value.
    Emitting,
    /// Pushing the bytes of a fake envelope back into the input.
    Replaying,
    /// End of stream or fatal error.
    Closed,
}

impl ScanState {
    /// Returns true while an envelope attempt is in progress.
    pub fn is_in_envelope(&self) -> bool {
        matches!(
            self,
            ScanState::EnvelopeReading | ScanState::KeyUnwrapping | ScanState::PayloadDecrypting
        )
    }
}

/// One unit of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// Bytes passed through unchanged.
    Plain(Vec<u8>),
    /// Plaintext of a decrypted envelope, replacing the envelope bytes.
    Decrypted(Vec<u8>),
    /// Tag and key block of a poison record, passed through unchanged after
    /// the poison callbacks ran.
    PoisonDetected(Vec<u8>),
}

impl ScanEvent {
    /// Bytes to write for this event.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            ScanEvent::Plain(b) | ScanEvent::Decrypted(b) | ScanEvent::PoisonDetected(b) => b,
        }
    }

    /// Consumes the event, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ScanEvent::Plain(b) | ScanEvent::Decrypted(b) | ScanEvent::PoisonDetected(b) => b,
        }
    }
}

/// Per-stream counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Bytes passed through as plain data.
    pub plain_bytes: u64,
    /// Envelopes decrypted.
    pub decrypted: u64,
    /// Full tag matches that turned out not to be envelopes.
    pub fake_matches: u64,
    /// Poison records detected.
    pub poison_records: u64,
    /// Full tag matches seen, fakes included.
    pub tag_matches: u64,
}

/// Decrypts envelopes embedded in byte streams.
///
/// One decryptor serves any number of streams; each stream gets its own
/// [`ScanSession`]. The key provider and poison callbacks are shared.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use veilgate_crypto::create_envelope;
/// use veilgate_decryptor::{DecryptorConfig, StreamDecryptor};
/// use veilgate_keystore::InMemoryKeyStore;
///
/// let keys = InMemoryKeyStore::new();
/// let public = keys.generate_client_keys(b"app").unwrap();
///
/// let mut row = b"id=1, secret=".to_vec();
/// row.extend(create_envelope(&public, b"app", b"hunter2").unwrap());
///
/// let decryptor = StreamDecryptor::new(DecryptorConfig::new("app"), Arc::new(keys)).unwrap();
/// assert_eq!(decryptor.decrypt_bytes(&row).unwrap(), b"id=1, secret=hunter2");
/// ```
pub struct StreamDecryptor {
    config: DecryptorConfig,
    keys: Arc<dyn KeyProvider>,
    callbacks: Arc<PoisonCallbackStorage>,
}

impl StreamDecryptor {
    /// Creates a decryptor with no poison callbacks.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the configuration does not validate.
    pub fn new(config: DecryptorConfig, keys: Arc<dyn KeyProvider>) -> DecryptResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            keys,
            callbacks: Arc::new(PoisonCallbackStorage::new()),
        })
    }

    /// Uses `callbacks` for poison detection.
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: Arc<PoisonCallbackStorage>) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &DecryptorConfig {
        &self.config
    }

    /// The poison callbacks.
    #[must_use]
    pub fn callbacks(&self) -> &Arc<PoisonCallbackStorage> {
        &self.callbacks
    }

    /// Starts scanning `reader`.
    pub fn session<R: Read>(&self, reader: R) -> ScanSession<'_, R> {
        ScanSession {
            decryptor: self,
            input: ScanInput::new(reader, self.config.read_buffer_size),
            tag: TagMatcher::new(),
            zone: ZoneMatcher::new(),
            plain: Vec::new(),
            pending: VecDeque::new(),
            poison_key: None,
            stats: ScanStats::default(),
            state: ScanState::Scanning,
            failure: None,
        }
    }

    /// Copies `reader` to `writer`, decrypting envelopes on the way.
    ///
    /// Output is flushed whenever no more input is immediately available.
    /// When `shutdown` is triggered, every byte consumed but not yet
    /// resolved is written as plain data before returning `Cancelled`.
    ///
    /// # Errors
    ///
    /// Fatal stream errors: I/O, key provider, poison callback, cancellation.
    pub fn decrypt_stream<R: Read, W: Write>(
        &self,
        reader: R,
        mut writer: W,
        shutdown: &ShutdownSignal,
    ) -> DecryptResult<ScanStats> {
        let mut session = self.session(reader);
        loop {
            if shutdown.is_triggered() {
                let rest = session.cancel();
                writer.write_all(&rest)?;
                writer.flush()?;
                info!(flushed = rest.len(), "stream cancelled");
                return Err(DecryptError::Cancelled);
            }

            let event = match session.next_event() {
                Ok(event) => event,
                Err(e) => {
                    let _ = writer.flush();
                    return Err(e);
                }
            };
            match event {
                Some(event) => {
                    writer.write_all(event.bytes())?;
                    if !session.has_buffered() {
                        writer.flush()?;
                    }
                }
                None => {
                    writer.flush()?;
                    return Ok(session.stats().clone());
                }
            }
        }
    }

    /// Runs the scanner over an in-memory value.
    ///
    /// # Errors
    ///
    /// Key provider and poison callback failures.
    pub fn decrypt_bytes(&self, data: &[u8]) -> DecryptResult<Vec<u8>> {
        let mut session = self.session(data);
        let mut out = Vec::with_capacity(data.len());
        while let Some(event) = session.next_event()? {
            out.extend_from_slice(event.bytes());
        }
        Ok(out)
    }

    /// Decrypts a value that must consist of exactly one envelope.
    ///
    /// # Errors
    ///
    /// `NotAnEnvelope` if the value holds anything else, including a poison
    /// record (whose callbacks have run by then).
    pub fn decrypt_value(&self, data: &[u8]) -> DecryptResult<Vec<u8>> {
        let mut session = self.session(data);
        let plaintext = match session.next_event()? {
            Some(ScanEvent::Decrypted(plaintext)) => plaintext,
            Some(ScanEvent::PoisonDetected(_)) => {
                return Err(DecryptError::not_an_envelope("poison record"))
            }
            Some(ScanEvent::Plain(_)) | None => {
                return Err(DecryptError::not_an_envelope("no envelope at start of value"))
            }
        };
        if session.next_event()?.is_some() {
            return Err(DecryptError::not_an_envelope("trailing bytes after envelope"));
        }
        Ok(plaintext)
    }
}

impl std::fmt::Debug for StreamDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecryptor")
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

/// Scanning state of one stream.
///
/// Yields [`ScanEvent`]s in stream order, either through
/// [`next_event`](Self::next_event) or as an iterator. After a fatal error
/// or end of stream the session is closed and yields nothing more.
pub struct ScanSession<'d, R> {
    decryptor: &'d StreamDecryptor,
    input: ScanInput<R>,
    tag: TagMatcher,
    zone: ZoneMatcher,
    plain: Vec<u8>,
    pending: VecDeque<ScanEvent>,
    poison_key: Option<ContentKey>,
    stats: ScanStats,
    state: ScanState,
    failure: Option<DecryptError>,
}

impl<'d, R: Read> ScanSession<'d, R> {
    /// Returns the next event, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// I/O, key provider and poison callback failures. Plain bytes read
    /// before the failure are returned first; the session is closed
    /// afterwards.
    pub fn next_event(&mut self) -> DecryptResult<Option<ScanEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if let Some(e) = self.failure.take() {
                return Err(e);
            }
            if self.state == ScanState::Closed {
                return Ok(None);
            }

            let byte = match self.input.next_byte() {
                Ok(byte) => byte,
                Err(e) => {
                    error!(error = %e, "read failed");
                    self.fail(e.into());
                    continue;
                }
            };
            let Some(byte) = byte else {
                self.finish();
                continue;
            };

            if let Err(e) = self.scan_byte(byte) {
                self.fail(e);
                continue;
            }
            if !self.pending.is_empty() {
                continue;
            }
            if self.plain.len() >= self.decryptor.config.max_plain_chunk
                || (!self.plain.is_empty() && !self.input.has_buffered())
            {
                return Ok(Some(ScanEvent::Plain(std::mem::take(&mut self.plain))));
            }
        }
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Current driver state.
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// True if output is waiting or input can be read without blocking.
    #[must_use]
    pub fn has_buffered(&self) -> bool {
        !self.pending.is_empty() || self.input.has_buffered()
    }

    /// Closes the session and returns every byte consumed but not yet
    /// handed out, in stream order.
    pub fn cancel(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        for event in self.pending.drain(..) {
            out.extend(event.into_bytes());
        }
        out.append(&mut self.plain);
        let held = self.tag.take_matched();
        let unread = self.input.take_buffered();
        self.stats.plain_bytes += (held.len() + unread.len()) as u64;
        out.extend(held);
        out.extend(unread);
        self.state = ScanState::Closed;
        out
    }

    fn scan_byte(&mut self, byte: u8) -> DecryptResult<()> {
        if self.decryptor.config.zone_mode {
            let had_zone = self.zone.is_matched();
            self.zone.observe(byte, self.decryptor.keys.as_ref());
            if !had_zone {
                self.emit_plain(&[byte]);
                return Ok(());
            }
        }

        loop {
            match self.tag.feed(byte) {
                MatchOutcome::Partial => {
                    self.state = ScanState::TagMatching;
                    return Ok(());
                }
                MatchOutcome::FullMatch => {
                    self.stats.tag_matches += 1;
                    return self.process_envelope();
                }
                MatchOutcome::Mismatch => {
                    self.state = ScanState::Scanning;
                    let held = self.tag.take_matched();
                    if held.is_empty() {
                        self.emit_plain(&[byte]);
                        return Ok(());
                    }
                    self.emit_plain(&held);
                }
            }
        }
    }

    fn process_envelope(&mut self) -> DecryptResult<()> {
        self.state = ScanState::EnvelopeReading;
        let mut reader = EnvelopeReader::new(self.tag.take_matched());

        let (is_zone, context_id) = match self.zone.active() {
            Some(zone) => (true, zone.to_vec()),
            None => (false, self.decryptor.config.client_id.clone()),
        };
        let context = if is_zone {
            KeyContext::Zone(&context_id)
        } else {
            KeyContext::Client(&context_id)
        };

        let private_key = self.fetch_private_key(&context)?;

        if !reader.read_key_block(&mut self.input)? {
            self.replay_fake(reader, "stream ended inside key block");
            return Ok(());
        }

        self.state = ScanState::KeyUnwrapping;
        let content_key = match unwrap_content_key(&private_key, reader.key_block()) {
            Ok(key) => key,
            Err(_) => {
                self.replay_fake(reader, "key block did not open");
                return Ok(());
            }
        };

        if self.decryptor.config.check_poison {
            self.ensure_poison_key()?;
            let is_poison = self
                .poison_key
                .as_ref()
                .is_some_and(|poison| content_key.ct_eq(poison));
            if is_poison {
                return self.handle_poison(reader, &context);
            }
        }

        self.state = ScanState::EnvelopeReading;
        if !reader.read_payload(&mut self.input, self.decryptor.config.max_payload_len)? {
            self.replay_fake(reader, "payload missing or out of range");
            return Ok(());
        }

        self.state = ScanState::PayloadDecrypting;
        match decrypt_payload(&content_key, context.id(), reader.ciphertext()) {
            Ok(plaintext) => {
                self.state = ScanState::Emitting;
                debug!(
                    kind = context.kind(),
                    len = plaintext.len(),
                    "decrypted envelope"
                );
                self.stats.decrypted += 1;
                self.zone.reset();
                self.push_event(ScanEvent::Decrypted(plaintext));
                self.state = ScanState::Scanning;
            }
            Err(_) => self.replay_fake(reader, "payload did not authenticate"),
        }
        Ok(())
    }

    fn fetch_private_key(&self, context: &KeyContext<'_>) -> DecryptResult<PrivateKey> {
        let keys = &self.decryptor.keys;
        let key = fetch_with_retry(self.decryptor.config.key_fetch_attempts, context.kind(), || {
            keys.private_key(context)
        })?;
        trace!(kind = context.kind(), key = %key.public_key().fingerprint(), "private key ready");
        Ok(key)
    }

    fn ensure_poison_key(&mut self) -> DecryptResult<()> {
        if self.poison_key.is_none() {
            let keys = &self.decryptor.keys;
            let key = fetch_with_retry(self.decryptor.config.key_fetch_attempts, "poison", || {
                keys.poison_key()
            })?;
            self.poison_key = Some(key);
        }
        Ok(())
    }

    fn handle_poison(&mut self, reader: EnvelopeReader, context: &KeyContext<'_>) -> DecryptResult<()> {
        warn!(
            kind = context.kind(),
            id = %String::from_utf8_lossy(context.id()),
            "poison record detected"
        );
        self.stats.poison_records += 1;

        if let Err(e) = self.decryptor.callbacks.call() {
            error!(error = %e, "poison callback failed");
            return Err(DecryptError::poison_callback(e.message));
        }

        self.zone.reset();
        self.push_event(ScanEvent::PoisonDetected(reader.into_consumed()));
        self.state = ScanState::Scanning;
        Ok(())
    }

    fn replay_fake(&mut self, reader: EnvelopeReader, reason: &'static str) {
        self.state = ScanState::Replaying;
        let consumed = reader.into_consumed();
        debug!(reason, len = consumed.len(), "fake envelope, replaying");
        self.stats.fake_matches += 1;

        if let Some((first, rest)) = consumed.split_first() {
            self.emit_plain(&[*first]);
            self.input.unread(rest);
        }
        self.state = ScanState::Scanning;
    }

    fn finish(&mut self) {
        let held = self.tag.take_matched();
        self.emit_plain(&held);
        if !self.plain.is_empty() {
            self.pending
                .push_back(ScanEvent::Plain(std::mem::take(&mut self.plain)));
        }
        self.state = ScanState::Closed;
        debug!(
            plain_bytes = self.stats.plain_bytes,
            decrypted = self.stats.decrypted,
            fake_matches = self.stats.fake_matches,
            poison_records = self.stats.poison_records,
            "stream finished"
        );
    }

    /// Closes the session. Plain bytes classified before the failure are
    /// still handed out ahead of the error.
    fn fail(&mut self, error: DecryptError) {
        if !self.plain.is_empty() {
            self.pending
                .push_back(ScanEvent::Plain(std::mem::take(&mut self.plain)));
        }
        self.failure = Some(error);
        self.state = ScanState::Closed;
    }

    fn emit_plain(&mut self, bytes: &[u8]) {
        self.plain.extend_from_slice(bytes);
        self.stats.plain_bytes += bytes.len() as u64;
    }

    fn push_event(&mut self, event: ScanEvent) {
        if !self.plain.is_empty() {
            self.pending
                .push_back(ScanEvent::Plain(std::mem::take(&mut self.plain)));
        }
        self.pending.push_back(event);
    }
}

impl<R: Read> Iterator for ScanSession<'_, R> {
    type Item = DecryptResult<ScanEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

/// Looks a key up, retrying transient failures up to `attempts` times.
fn fetch_with_retry<T>(
    attempts: u32,
    kind: &'static str,
    mut lookup: impl FnMut() -> KeyStoreResult<T>,
) -> DecryptResult<T> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match lookup() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(kind, attempt, error = %e, "key lookup failed, retrying");
                attempt += 1;
            }
            Err(e) => {
                error!(kind, attempt, error = %e, "key lookup failed");
                return Err(DecryptError::key_unavailable(kind, attempt, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veilgate_crypto::{create_envelope, TAG_BEGIN};
    use veilgate_keystore::{InMemoryKeyStore, KeyStoreError};

    fn decryptor() -> (StreamDecryptor, veilgate_crypto::PublicKey) {
        let keys = InMemoryKeyStore::new();
        let public = keys.generate_client_keys(b"app").unwrap();
        let decryptor = StreamDecryptor::new(DecryptorConfig::new("app"), Arc::new(keys)).unwrap();
        (decryptor, public)
    }

    #[test]
    fn plain_stream_passes_through() {
        let (decryptor, _) = decryptor();
        assert_eq!(decryptor.decrypt_bytes(b"hello world").unwrap(), b"hello world");
        assert!(decryptor.decrypt_bytes(b"").unwrap().is_empty());
    }

    #[test]
    fn events_in_order() {
        let (decryptor, public) = decryptor();
        let mut data = b"a".to_vec();
        data.extend(create_envelope(&public, b"app", b"X").unwrap());
        data.extend_from_slice(b"b");

        let events: Vec<_> = decryptor
            .session(&data[..])
            .collect::<DecryptResult<_>>()
            .unwrap();
        assert_eq!(
            events,
            vec![
                ScanEvent::Plain(b"a".to_vec()),
                ScanEvent::Decrypted(b"X".to_vec()),
                ScanEvent::Plain(b"b".to_vec()),
            ]
        );
    }

    #[test]
    fn session_closes_at_eof() {
        let (decryptor, _) = decryptor();
        let mut session = decryptor.session(&b"abc"[..]);
        while session.next_event().unwrap().is_some() {}
        assert_eq!(session.state(), ScanState::Closed);
        assert_eq!(session.stats().plain_bytes, 3);
        assert!(session.next_event().unwrap().is_none());
    }

    #[test]
    fn cancel_returns_held_bytes() {
        let (decryptor, _) = decryptor();
        let mut session = decryptor.session(&b"ab\"\"\""[..]);
        assert_eq!(
            session.next_event().unwrap(),
            Some(ScanEvent::Plain(b"ab".to_vec()))
        );
        session.input.unread(b"xy");
        assert_eq!(session.cancel(), b"\"\"\"xy");
        assert_eq!(session.state(), ScanState::Closed);
        assert!(session.next_event().unwrap().is_none());
    }

    #[test]
    fn cancel_returns_unscanned_reader_bytes() {
        let (decryptor, _) = decryptor();
        let config = DecryptorConfig::new("app").max_plain_chunk(2);
        let decryptor = StreamDecryptor::new(config, Arc::clone(&decryptor.keys)).unwrap();
        let mut session = decryptor.session(&b"abcdef"[..]);
        assert_eq!(
            session.next_event().unwrap(),
            Some(ScanEvent::Plain(b"ab".to_vec()))
        );
        assert_eq!(session.cancel(), b"cdef");
        assert_eq!(session.stats().plain_bytes, 6);
        assert_eq!(session.state(), ScanState::Closed);
        assert!(session.next_event().unwrap().is_none());
    }

    #[test]
    fn mismatch_reemits_partial_tag() {
        let (decryptor, _) = decryptor();
        let data = b"ab\"\"\"cd\"\"";
        assert_eq!(decryptor.decrypt_bytes(data).unwrap(), data);
    }

    #[test]
    fn tag_at_eof_is_flushed() {
        let (decryptor, _) = decryptor();
        let mut data = b"x".to_vec();
        data.extend_from_slice(&TAG_BEGIN);
        assert_eq!(decryptor.decrypt_bytes(&data).unwrap(), data);
    }

    #[test]
    fn decrypt_value_requires_single_envelope() {
        let (decryptor, public) = decryptor();
        let envelope = create_envelope(&public, b"app", b"v").unwrap();
        assert_eq!(decryptor.decrypt_value(&envelope).unwrap(), b"v");

        let mut trailing = envelope.clone();
        trailing.push(b'!');
        assert!(matches!(
            decryptor.decrypt_value(&trailing),
            Err(DecryptError::NotAnEnvelope { .. })
        ));
        assert!(decryptor.decrypt_value(b"plain").is_err());
    }

    #[test]
    fn retry_stops_at_not_found() {
        let mut calls = 0;
        let result: DecryptResult<()> = fetch_with_retry(5, "client", || {
            calls += 1;
            Err(KeyStoreError::not_found("client", b"x"))
        });
        assert!(result.unwrap_err().is_key_error());
        assert_eq!(calls, 1);
    }

    #[test]
    fn retry_transient_until_success() {
        let mut calls = 0;
        let result = fetch_with_retry(3, "client", || {
            calls += 1;
            if calls < 3 {
                Err(KeyStoreError::unavailable("busy"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn retry_gives_up() {
        let mut calls = 0;
        let result: DecryptResult<()> = fetch_with_retry(2, "zone", || {
            calls += 1;
            Err(KeyStoreError::unavailable("busy"))
        });
        match result.unwrap_err() {
            DecryptError::KeyUnavailable { attempts, kind, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(kind, "zone");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls, 2);
    }

    #[test]
    fn state_helpers() {
        assert!(ScanState::KeyUnwrapping.is_in_envelope());
        assert!(!ScanState::Scanning.is_in_envelope());
    }
}
