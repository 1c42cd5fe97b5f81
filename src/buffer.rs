//! Fixed-capacity linear byte buffer with append-tail / consume-head cursors.
//!
//! A ring buffer would avoid the occasional `compact`, but edge-triggered
//! draining empties buffers completely often enough that the ring's cyclic
//! advantage rarely materializes — so this stays a flat array plus two
//! cursors.

use crate::errors::Kind;
use std::io::{self, Read, Write};

/// Default capacity: 16 KiB holds most HTTP requests plus a small body.
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Outcome of a single non-blocking `read`/`write` attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum IoOutcome {
    /// Number of bytes transferred (always `> 0`).
    Progress(usize),
    /// Clean EOF on read (peer closed its write side).
    Eof,
    /// `EAGAIN`/`EWOULDBLOCK`: no bytes moved, try again after the next
    /// readiness edge.
    WouldBlock,
}

/// A fixed-capacity byte window: `bytes[pos..len)` holds unread data,
/// `bytes[len..capacity)` holds free space.
///
/// Invariant: `0 <= pos <= len <= capacity` at all times.
pub struct Buffer {
    bytes: Box<[u8]>,
    pos: usize,
    len: usize,
}

impl Buffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Buffer {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            pos: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.pos == self.len
    }

    pub fn is_full(&self) -> bool {
        self.len == self.bytes.len()
    }

    /// Unread bytes still waiting to be consumed.
    pub fn readable(&self) -> usize {
        self.len - self.pos
    }

    /// Free space at the tail available to `append`/`read_from`.
    pub fn writable(&self) -> usize {
        self.bytes.len() - self.len
    }

    /// The unread prefix, `bytes[pos..len)`.
    pub fn unread(&self) -> &[u8] {
        &self.bytes[self.pos..self.len]
    }

    /// Marks `n` bytes as consumed from the head. Resets both cursors to
    /// zero when the buffer drains completely.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.len);
        self.pos += n;
        if self.pos == self.len {
            self.pos = 0;
            self.len = 0;
        }
    }

    /// Moves `[pos..len)` down to offset 0. No-op when already compact or
    /// empty. Idempotent: `compact(); compact()` leaves the buffer
    /// byte-for-byte identical to a single `compact()`.
    pub fn compact(&mut self) {
        if self.pos == 0 || self.is_empty() {
            if self.is_empty() {
                self.pos = 0;
                self.len = 0;
            }
            return;
        }
        self.bytes.copy_within(self.pos..self.len, 0);
        self.len -= self.pos;
        self.pos = 0;
    }

    /// Copies at most `writable()` bytes from `src` into the tail. Returns
    /// the number of bytes actually copied.
    pub fn append(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.writable());
        let start = self.len;
        self.bytes[start..start + n].copy_from_slice(&src[..n]);
        self.len += n;
        n
    }

    /// Fills `[len..capacity)` via one non-blocking read. Fails with
    /// `NoBufferSpace`-shaped `Kind::Io` if the buffer is already full, since
    /// that signals a caller bug — the engine must stop reading before the
    /// buffer saturates by honoring `wants_read`.
    pub fn read_from<R: Read>(&mut self, src: &mut R) -> Result<IoOutcome, Kind> {
        if self.is_full() {
            return Err(Kind::Io(crate::errors::IoError(io::Error::new(
                io::ErrorKind::Other,
                "buffer has no space left",
            ))));
        }
        let start = self.len;
        match src.read(&mut self.bytes[start..]) {
            Ok(0) => Ok(IoOutcome::Eof),
            Ok(n) => {
                self.len += n;
                Ok(IoOutcome::Progress(n))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(IoOutcome::WouldBlock),
            Err(e) => Err(Kind::from(e)),
        }
    }

    /// Writes `[pos..len)` via one non-blocking write, advancing `pos` on
    /// partial success and resetting both cursors when fully drained.
    pub fn write_to<W: Write>(&mut self, dst: &mut W) -> Result<IoOutcome, Kind> {
        if self.is_empty() {
            return Ok(IoOutcome::Progress(0));
        }
        match dst.write(&self.bytes[self.pos..self.len]) {
            Ok(0) => Ok(IoOutcome::Eof),
            Ok(n) => {
                self.advance(n);
                Ok(IoOutcome::Progress(n))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(IoOutcome::WouldBlock),
            Err(e) => Err(Kind::from(e)),
        }
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::with_capacity(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn fresh_buffer_is_empty() {
        let b = Buffer::with_capacity(16);
        assert!(b.is_empty());
        assert!(!b.is_full());
        assert_eq!(b.readable(), 0);
        assert_eq!(b.writable(), 16);
    }

    #[test]
    fn append_then_advance() {
        let mut b = Buffer::with_capacity(8);
        assert_eq!(b.append(b"hello"), 5);
        assert_eq!(b.readable(), 5);
        assert_eq!(b.unread(), b"hello");
        b.advance(3);
        assert_eq!(b.unread(), b"lo");
        b.advance(2);
        assert!(b.is_empty());
        assert_eq!(b.pos(), 0);
        assert_eq!(b.len(), 0);
    }

    #[test]
    fn append_truncates_to_writable() {
        let mut b = Buffer::with_capacity(4);
        assert_eq!(b.append(b"abcdef"), 4);
        assert!(b.is_full());
    }

    #[test]
    fn compact_moves_unread_to_head() {
        let mut b = Buffer::with_capacity(8);
        b.append(b"abcdef");
        b.advance(4);
        assert_eq!(b.unread(), b"ef");
        b.compact();
        assert_eq!(b.pos(), 0);
        assert_eq!(b.len(), 2);
        assert_eq!(b.unread(), b"ef");
    }

    #[test]
    fn compact_is_idempotent() {
        let mut b = Buffer::with_capacity(8);
        b.append(b"abcdef");
        b.advance(4);
        b.compact();
        let (pos1, len1) = (b.pos(), b.len());
        b.compact();
        assert_eq!((b.pos(), b.len()), (pos1, len1));
    }

    #[test]
    fn compact_noop_when_already_at_head() {
        let mut b = Buffer::with_capacity(8);
        b.append(b"ab");
        b.compact();
        assert_eq!(b.pos(), 0);
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn read_from_drains_source() {
        let mut b = Buffer::with_capacity(16);
        let mut src = Cursor::new(b"hi there".to_vec());
        let outcome = b.read_from(&mut src).unwrap();
        assert_eq!(outcome, IoOutcome::Progress(8));
        assert_eq!(b.unread(), b"hi there");
    }

    #[test]
    fn read_from_reports_eof() {
        let mut b = Buffer::with_capacity(16);
        let mut src = Cursor::new(Vec::<u8>::new());
        assert_eq!(b.read_from(&mut src).unwrap(), IoOutcome::Eof);
    }

    #[test]
    fn write_to_drains_and_resets() {
        let mut b = Buffer::with_capacity(16);
        b.append(b"payload");
        let mut dst = Vec::new();
        let outcome = b.write_to(&mut dst).unwrap();
        assert_eq!(outcome, IoOutcome::Progress(7));
        assert_eq!(dst, b"payload");
        assert!(b.is_empty());
        assert_eq!(b.pos(), 0);
    }

    #[test]
    fn drain_with_nothing_pending_is_a_noop() {
        let mut b = Buffer::with_capacity(16);
        let mut dst = Vec::new();
        let outcome = b.write_to(&mut dst).unwrap();
        assert_eq!(outcome, IoOutcome::Progress(0));
        assert!(dst.is_empty());
    }
}
