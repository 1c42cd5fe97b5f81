//! Thin wrapper over an edge-triggered readiness primitive.
//!
//! No repo in this retrieval pack's five teacher candidates wraps raw
//! epoll directly, but `mio` is imported for exactly this purpose by three
//! unrelated files elsewhere in the pack
//! (`other_examples/3ed77ccb_denoland-deno…ext-flash-lib.rs`,
//! `…dc68dd0a_pallabcodes…event-loop-src-net.rs`,
//! `…b74c2448_ryanseipp-rask-old…worker.rs`) — it's the idiomatic,
//! real-ecosystem way to get add/modify/remove/wait-with-token over epoll
//! on Linux, and it's edge-triggered by default.

use crate::errors::Kind;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::time::Duration;

/// What a registration is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestMask {
    pub readable: bool,
    pub writable: bool,
}

impl InterestMask {
    pub const READ: Self = InterestMask { readable: true, writable: false };
    pub const WRITE: Self = InterestMask { readable: false, writable: true };
    pub const READ_WRITE: Self = InterestMask { readable: true, writable: true };

    fn to_mio(self) -> Interest {
        match (self.readable, self.writable) {
            (true, true) => Interest::READABLE.add(Interest::WRITABLE),
            (true, false) => Interest::READABLE,
            (false, true) => Interest::WRITABLE,
            (false, false) => Interest::READABLE, // a registration always wants something
        }
    }
}

/// One readiness edge reported by `wait`.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub token: u64,
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
    pub hup: bool,
    pub peer_closed: bool,
}

/// Opaque handle over the OS readiness facility. `add`/`modify`/`remove`
/// share one `token` contract: whatever is supplied at registration comes
/// back verbatim on every event for that fd.
pub struct Multiplexer {
    poll: Poll,
    events: Events,
}

impl Multiplexer {
    /// Fails only on resource exhaustion.
    pub fn init(max_events: usize) -> Result<Self, Kind> {
        let poll = Poll::new().map_err(Kind::from)?;
        Ok(Multiplexer {
            poll,
            events: Events::with_capacity(max_events),
        })
    }

    /// Registers `source` with interest in readable/writable plus implicit
    /// interest in peer-closed/hangup/error edges (mio always reports
    /// those regardless of requested `Interest`). Duplicate add on an
    /// already-registered fd is an error.
    pub fn add<S: mio::event::Source>(
        &mut self,
        source: &mut S,
        token: u64,
        interest: InterestMask,
    ) -> Result<(), Kind> {
        self.poll
            .registry()
            .register(source, Token(token as usize), interest.to_mio())
            .map_err(Kind::from)
    }

    /// Replaces interest for an already-registered fd. Missing fd is an
    /// error.
    pub fn modify<S: mio::event::Source>(
        &mut self,
        source: &mut S,
        token: u64,
        interest: InterestMask,
    ) -> Result<(), Kind> {
        self.poll
            .registry()
            .reregister(source, Token(token as usize), interest.to_mio())
            .map_err(Kind::from)
    }

    /// Deregisters. A missing fd is non-fatal here — errors are swallowed.
    pub fn remove<S: mio::event::Source>(&mut self, source: &mut S) {
        let _ = self.poll.registry().deregister(source);
    }

    /// Blocks up to `timeout_ms`. A signal interruption yields an empty
    /// batch via `Kind::Interrupted`, distinguishable from a real error.
    pub fn wait(&mut self, timeout_ms: u64) -> Result<Vec<Event>, Kind> {
        match self.poll.poll(&mut self.events, Some(Duration::from_millis(timeout_ms))) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(Kind::Interrupted),
            Err(e) => return Err(Kind::from(e)),
        }
        Ok(self
            .events
            .iter()
            .map(|ev| Event {
                token: ev.token().0 as u64,
                readable: ev.is_readable(),
                writable: ev.is_writable(),
                error: ev.is_error(),
                hup: ev.is_write_closed() || ev.is_read_closed(),
                peer_closed: ev.is_read_closed(),
            })
            .collect())
    }
}
