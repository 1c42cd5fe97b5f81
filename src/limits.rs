//! Proxy configuration limits and timeouts.
//!
//! Every default below is a deliberately chosen constant (pool size, buffer
//! capacity, framer bounds, timeouts), not an arbitrary placeholder.

use std::time::Duration;

/// Pool sizing, epoll batching, and listener backlog.
#[derive(Debug, Clone, Copy)]
pub struct ServerLimits {
    /// Number of connection slots in the pool.
    pub pool_size: usize,
    /// Events retrieved per `wait()` call.
    pub max_events: usize,
    /// `listen()` backlog.
    pub listen_backlog: i32,
}

impl Default for ServerLimits {
    fn default() -> Self {
        ServerLimits {
            pool_size: 10_000,
            max_events: 256,
            listen_backlog: 511,
        }
    }
}

/// Per-connection timeouts and keep-alive accounting.
#[derive(Debug, Clone, Copy)]
pub struct ConnLimits {
    /// How long a slot may remain in `CONNECTING` before it's torn down.
    pub connect_timeout: Duration,
    /// How long a post-connect slot may sit with no successful read/write
    /// before the idle reaper closes it.
    pub idle_timeout: Duration,
    /// Keep-alive reuse cap per client connection.
    pub max_requests_per_connection: usize,
    /// Read/write buffer capacity per slot.
    pub buffer_capacity: usize,
}

impl Default for ConnLimits {
    fn default() -> Self {
        ConnLimits {
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            max_requests_per_connection: 1000,
            buffer_capacity: crate::buffer::DEFAULT_CAPACITY,
        }
    }
}

/// HTTP/1 request framer bounds.
#[derive(Debug, Clone, Copy)]
pub struct ReqLimits {
    /// Total request size cap (request line + headers + body) that
    /// triggers a synthesized `413` mid-stream.
    pub max_request_size: usize,
    /// Cap on `Content-Length` itself.
    pub max_content_length: usize,
}

impl ReqLimits {
    pub const MAX_PATH_LEN: usize = 8192;
    pub const MAX_HEADER_NAME_LEN: usize = 128;
    pub const MAX_HEADER_VALUE_LEN: usize = 8192;
    pub const MAX_HEADERS: usize = 64;
}

impl Default for ReqLimits {
    fn default() -> Self {
        ReqLimits {
            max_request_size: 10 * 1024 * 1024,
            max_content_length: 100 * 1024 * 1024,
        }
    }
}

/// Top-level bundle handed to the engine at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub server: ServerLimits,
    pub conn: ConnLimits,
    pub req: ReqLimits,
}
