//! Buffered scan input with a replay queue.
//!
//! Bytes of a fake envelope are pushed back in front of the live stream and
//! read again by the same state machine, so a real envelope hidden inside a
//! false match is still found. The queue is drained before the reader is
//! touched again.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};

pub(crate) struct ScanInput<R> {
    reader: BufReader<R>,
    replay: VecDeque<u8>,
}

impl<R: Read> ScanInput<R> {
    pub(crate) fn new(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            replay: VecDeque::new(),
        }
    }

    /// Next byte, or `None` at end of stream.
    pub(crate) fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.replay.pop_front() {
            return Ok(Some(b));
        }
        let buf = fill_buf_retrying(&mut self.reader)?;
        let Some(&b) = buf.first() else {
            return Ok(None);
        };
        self.reader.consume(1);
        Ok(Some(b))
    }

    /// Appends up to `n` bytes to `out`.
    ///
    /// Returns `false` if the stream ended first; whatever was read is still
    /// in `out`.
    pub(crate) fn read_exact_or_eof(&mut self, out: &mut Vec<u8>, n: usize) -> io::Result<bool> {
        let mut remaining = n;

        let from_replay = remaining.min(self.replay.len());
        out.extend(self.replay.drain(..from_replay));
        remaining -= from_replay;

        while remaining > 0 {
            let buf = fill_buf_retrying(&mut self.reader)?;
            if buf.is_empty() {
                return Ok(false);
            }
            let take = remaining.min(buf.len());
            out.extend_from_slice(&buf[..take]);
            self.reader.consume(take);
            remaining -= take;
        }
        Ok(true)
    }

    /// Puts `bytes` back so they are read next, in order.
    pub(crate) fn unread(&mut self, bytes: &[u8]) {
        for &b in bytes.iter().rev() {
            self.replay.push_front(b);
        }
    }

    /// True if a byte can be returned without blocking on the reader.
    pub(crate) fn has_buffered(&self) -> bool {
        !self.replay.is_empty() || !self.reader.buffer().is_empty()
    }

    /// Removes and returns every byte already pulled from the source but
    /// not yet scanned: the replay queue, then the reader's buffer.
    pub(crate) fn take_buffered(&mut self) -> Vec<u8> {
        let mut out: Vec<u8> = self.replay.drain(..).collect();
        let buffered = self.reader.buffer();
        let len = buffered.len();
        out.extend_from_slice(buffered);
        self.reader.consume(len);
        out
    }
}

fn fill_buf_retrying<R: Read>(reader: &mut BufReader<R>) -> io::Result<&[u8]> {
    // Retry in a loop without holding the borrow across iterations.
    loop {
        match reader.fill_buf() {
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(reader.buffer())
}
