//! Crate-wide error taxonomy.
//!
//! Every outcome an I/O primitive or protocol check can produce is classified
//! into one of the kinds below. The event loop never lets an error escape
//! unclassified: each kind maps to exactly one policy (retry, teardown,
//! synthesize-and-close, or abort startup).

use std::{error, fmt, io};

/// Classification of every non-happy-path outcome the engine can observe.
///
/// Named for what happened, not for a Rust type — `TransientReadiness` isn't
/// really an error at all, it's "drained for now".
#[derive(Debug)]
pub enum Kind {
    /// `EAGAIN`/`EWOULDBLOCK`. Not an error; the read/write loop exits and
    /// returns control to the dispatcher.
    TransientReadiness,
    /// Clean EOF, `ECONNRESET`, `EPIPE`, or a peer-closed/hangup readiness
    /// edge. Torn down per the teardown policy; never logged above `trace`.
    PeerClosed,
    /// Malformed or oversize HTTP request.
    Protocol,
    /// Backend connect refused, timed out, or failed immediately.
    UpstreamUnreachable,
    /// No free connection slot for a new client or upstream.
    PoolExhausted,
    /// `wait()` was interrupted by a signal; retry the loop iteration.
    Interrupted,
    /// Bind, multiplexer creation, or listener setup failed at startup.
    FatalInit,
    /// Any other I/O error, wrapped for `Display`/equality.
    Io(IoError),
}

impl Kind {
    /// True if this kind should never surface in default-verbosity logs.
    pub fn is_quiet(&self) -> bool {
        matches!(self, Kind::TransientReadiness | Kind::PeerClosed)
    }
}

impl error::Error for Kind {}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::TransientReadiness => write!(f, "transient readiness (EAGAIN)"),
            Kind::PeerClosed => write!(f, "peer closed"),
            Kind::Protocol => write!(f, "protocol error"),
            Kind::UpstreamUnreachable => write!(f, "upstream unreachable"),
            Kind::PoolExhausted => write!(f, "connection pool exhausted"),
            Kind::Interrupted => write!(f, "interrupted syscall"),
            Kind::FatalInit => write!(f, "fatal initialization error"),
            Kind::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl From<io::Error> for Kind {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => Kind::TransientReadiness,
            io::ErrorKind::Interrupted => Kind::Interrupted,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Kind::PeerClosed,
            _ => Kind::Io(IoError(err)),
        }
    }
}

/// Newtype wrapping [`io::Error`] so it can be compared by kind alone.
#[derive(Debug)]
pub struct IoError(pub io::Error);

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}
