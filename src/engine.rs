//! The proxy event loop: accept, async connect, read→forward→write, HTTP
//! framing, and error/keepalive recycling, composed over the pool and
//! multiplexer.
//!
//! One `mio::Poll::poll` loop runs on one thread, dispatching each batch of
//! readiness events to the accept/read/write/connect/error handlers below —
//! no worker pool, no async runtime.

use crate::buffer::{Buffer, IoOutcome};
use crate::cli::Mode;
use crate::errors::Kind;
use crate::http::framer::{self, Outcome as FramerOutcome};
use crate::http::status::StatusCode;
use crate::http::types::Method;
use crate::limits::Limits;
use crate::mux::{InterestMask, Multiplexer};
use crate::pool::{predicates, Pool, Role, State};
use crate::stats::Stats;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// `mio::Token` reserved for the listening socket. Slot indices never reach `u32::MAX` given the pool's realistic
/// sizing, so this is safe as a sentinel distinct from any real token.
const LISTENER_TOKEN: u64 = u64::MAX;

/// How the two halves of a forward direction behave on read.
enum ReadBranch {
    /// Opaque byte relay: used for stream mode (either role) and, in HTTP
    /// mode, for the upstream side relaying a response back.
    Stream,
    /// HTTP/1 request framing: HTTP mode, client role, still assembling a
    /// request.
    HttpClient,
}

enum SpawnError {
    PoolExhausted,
    Io,
}

/// What a completed framing pass over the client's prefix resolved to, with
/// only the `Copy` fields `dispatch` needs — kept separate from
/// `framer::Request` so nothing here borrows the read buffer past the
/// `parse` call (the buffer is about to be mutated).
enum FrameResult {
    Need,
    Malformed,
    Complete { method: Method, keep_alive: bool, total_length: usize },
}

fn frame_prefix(pool: &Pool, index: u32) -> FrameResult {
    let prefix = pool.get(index).read_buf.unread();
    match framer::parse(prefix) {
        FramerOutcome::Need => FrameResult::Need,
        FramerOutcome::Malformed => FrameResult::Malformed,
        FramerOutcome::Complete(req) => FrameResult::Complete {
            method: req.method,
            keep_alive: req.keep_alive,
            total_length: req.total_length,
        },
    }
}

/// Builds the listening socket: non-blocking, `SO_REUSEADDR`,
/// `SO_REUSEPORT` and `TCP_DEFER_ACCEPT` where available.
fn build_listener(addr: SocketAddr, backlog: i32) -> io::Result<mio::net::TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    {
        // Not available on every kernel; absence is not fatal.
        let _ = socket.set_reuse_port(true);
    }
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    apply_defer_accept(&socket);
    let std_listener: std::net::TcpListener = socket.into();
    Ok(mio::net::TcpListener::from_std(std_listener))
}

/// `TCP_DEFER_ACCEPT` is Linux-only and `socket2` doesn't wrap it, so this
/// falls back to a direct `libc::setsockopt`; absence on other platforms is
/// non-fatal ("where available").
#[cfg(target_os = "linux")]
fn apply_defer_accept(socket: &Socket) {
    let optval: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::IPPROTO_TCP,
            libc::TCP_DEFER_ACCEPT,
            &optval as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        tracing::debug!("TCP_DEFER_ACCEPT unavailable, continuing without it");
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_defer_accept(_socket: &Socket) {}

/// `TCP_NODELAY` and `SO_KEEPALIVE` on a data socket.
fn apply_data_socket_options(stream: &mio::net::TcpStream) {
    let sock = SockRef::from(stream);
    if let Err(e) = sock.set_nodelay(true) {
        tracing::debug!(error = %e, "TCP_NODELAY unavailable");
    }
    if let Err(e) = sock.set_keepalive(true) {
        tracing::debug!(error = %e, "SO_KEEPALIVE unavailable");
    }
}

/// Composes the buffer, multiplexer, pool, and HTTP framer into the single
/// event-loop dispatcher.
pub struct Engine {
    mux: Multiplexer,
    listener: mio::net::TcpListener,
    pool: Pool,
    backend_addr: SocketAddr,
    mode: Mode,
    limits: Limits,
    stats: Stats,
}

impl Engine {
    /// `init`: creates the multiplexer, the listening socket, binds,
    /// listens, and registers the listener with readable interest and the
    /// sentinel token. Fails only with `Kind::FatalInit`.
    pub fn init(
        listen_addr: SocketAddr,
        backend_addr: SocketAddr,
        mode: Mode,
        limits: Limits,
    ) -> Result<Self, Kind> {
        let mut mux = Multiplexer::init(limits.server.max_events)?;
        let mut listener = build_listener(listen_addr, limits.server.listen_backlog).map_err(|e| {
            tracing::error!(error = %e, addr = %listen_addr, "failed to bind listener");
            Kind::FatalInit
        })?;
        mux.add(&mut listener, LISTENER_TOKEN, InterestMask::READ)
            .map_err(|_| Kind::FatalInit)?;
        let pool = Pool::new(limits.server.pool_size, limits.conn.buffer_capacity);
        tracing::info!(listen = %listen_addr, backend = %backend_addr, mode = ?mode, "proxy initialized");
        Ok(Engine { mux, listener, pool, backend_addr, mode, limits, stats: Stats::default() })
    }

    /// `run`: the cooperative event loop. Returns once `shutdown`
    /// flips to `true`, which is checked at the top of every iteration.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), Kind> {
        let mut last_maintenance = Instant::now();
        while !shutdown.load(Ordering::SeqCst) {
            let events = match self.mux.wait(1000) {
                Ok(events) => events,
                Err(Kind::Interrupted) => continue,
                Err(e) => return Err(e),
            };
            for event in events {
                if event.token == LISTENER_TOKEN {
                    self.handle_accept();
                    continue;
                }
                let index = event.token as u32;
                if !self.pool.get(index).is_live() {
                    // Stale event for a slot already torn down and possibly
                    // reused by the time this batch is processed.
                    continue;
                }
                if event.error || event.hup {
                    self.handle_error(index);
                    continue;
                }
                if self.pool.get(index).state == State::Connecting && event.writable {
                    self.handle_connect(index);
                    if self.pool.get(index).is_live() && self.pool.get(index).state == State::Connected {
                        self.handle_write(index);
                    }
                    continue;
                }
                if event.writable {
                    self.handle_write(index);
                }
                if self.pool.get(index).is_live() && event.readable {
                    self.handle_read(index);
                }
            }
            if last_maintenance.elapsed() >= Duration::from_secs(1) {
                self.maintenance_tick();
                last_maintenance = Instant::now();
            }
        }
        Ok(())
    }

    /// Closes every live slot, the listener, and the multiplexer, then
    /// returns the final statistics block.
    pub fn shutdown(mut self) -> Stats {
        let live: Vec<u32> = self.pool.iter_live().collect();
        for index in live {
            self.close_slot(index);
        }
        self.mux.remove(&mut self.listener);
        tracing::info!("\n{}", self.stats.report());
        self.stats
    }

    // ---- accept -------------------------------------------------------------

    fn handle_accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    tracing::debug!(%addr, "accepted client connection");
                    self.on_accepted(stream);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn on_accepted(&mut self, mut stream: mio::net::TcpStream) {
        apply_data_socket_options(&stream);
        let fd = stream.as_raw_fd();

        let index = match self.pool.alloc() {
            Some(index) => index,
            None => {
                // Pool exhaustion: accept only to immediately
                // close, never evict a live connection.
                self.stats.errors += 1;
                tracing::debug!(fd, "connection pool exhausted, rejecting client");
                drop(stream);
                return;
            }
        };

        if let Err(e) = self.mux.add(&mut stream, index as u64, InterestMask::READ) {
            tracing::warn!(error = %e, "failed to register client socket");
            self.pool.free(index);
            return;
        }

        self.stats.total_connections += 1;
        self.stats.active_connections += 1;
        {
            let slot = self.pool.get_mut(index);
            slot.fd = fd;
            slot.role = Role::Client;
            slot.last_active = Instant::now();
            slot.stream = Some(stream);
            slot.state = match self.mode {
                Mode::Tcp => State::Connected,
                Mode::Http => {
                    slot.http.reset();
                    State::ReadingRequest
                }
            };
        }

        if self.mode == Mode::Tcp {
            match self.spawn_upstream() {
                Ok(upstream_index) => {
                    self.pool.pair(index, upstream_index);
                    self.update_interest(index);
                }
                Err(_) => {
                    self.stats.errors += 1;
                    self.close_slot(index);
                }
            }
        }
    }

    /// Creates a non-blocking upstream socket and initiates the backend
    /// connect. `mio::net::TcpStream::connect` already folds
    /// immediate success and in-progress (`EINPROGRESS`) into `Ok`; only a
    /// connect that fails synchronously (bad address, local resource
    /// exhaustion) surfaces as `Err` here. The writable edge distinguishes
    /// the remaining two outcomes later, in `handle_connect`.
    fn spawn_upstream(&mut self) -> Result<u32, SpawnError> {
        let index = self.pool.alloc().ok_or(SpawnError::PoolExhausted)?;
        match mio::net::TcpStream::connect(self.backend_addr) {
            Ok(mut stream) => {
                apply_data_socket_options(&stream);
                let fd = stream.as_raw_fd();
                if let Err(e) = self.mux.add(&mut stream, index as u64, InterestMask::WRITE) {
                    tracing::warn!(error = %e, "failed to register upstream socket");
                    self.pool.free(index);
                    return Err(SpawnError::Io);
                }
                let slot = self.pool.get_mut(index);
                slot.fd = fd;
                slot.role = Role::Upstream;
                slot.state = State::Connecting;
                slot.last_active = Instant::now();
                slot.stream = Some(stream);
                Ok(index)
            }
            Err(e) => {
                tracing::debug!(error = %e, backend = %self.backend_addr, "backend connect failed immediately");
                self.pool.free(index);
                Err(SpawnError::Io)
            }
        }
    }

    // ---- connect completion ---------------------------------------------------

    fn handle_connect(&mut self, index: u32) {
        let error = self
            .pool
            .get(index)
            .stream
            .as_ref()
            .and_then(|s| s.take_error().ok().flatten());

        match error {
            None => {
                self.pool.get_mut(index).state = State::Connected;
                self.pool.get_mut(index).last_active = Instant::now();
                tracing::debug!(slot = index, "backend connection established");
                self.update_interest(index);
                if let Some(peer) = self.pool.peer_of(index) {
                    self.update_interest(peer);
                }
            }
            Some(e) => {
                tracing::debug!(error = %e, "backend connect failed");
                self.stats.errors += 1;
                self.fail_upstream_connect(index);
            }
        }
    }

    /// Backend connect refused, timed out, or errored: free
    /// the upstream slot, and in HTTP mode synthesize `502` on the paired
    /// client (always pre-response — this path only runs before the
    /// upstream ever finished connecting); in stream mode tear the pair
    /// down.
    fn fail_upstream_connect(&mut self, upstream_index: u32) {
        let client = self.pool.peer_of(upstream_index);
        self.close_slot(upstream_index);
        if let Some(client_index) = client {
            if self.mode == Mode::Http {
                self.synthesize_and_close(client_index, StatusCode::BadGateway);
            } else {
                self.close_slot(client_index);
            }
        }
    }

    // ---- read -----------------------------------------------------------------

    fn handle_read(&mut self, index: u32) {
        let slot = self.pool.get(index);
        let branch = if self.mode == Mode::Http && slot.role == Role::Client && slot.state == State::ReadingRequest {
            ReadBranch::HttpClient
        } else {
            ReadBranch::Stream
        };
        match branch {
            ReadBranch::Stream => self.read_stream(index),
            ReadBranch::HttpClient => self.read_http_client(index),
        }
    }

    /// Stream-mode forwarding, and the upstream side of an HTTP-mode
    /// response relay.
    fn read_stream(&mut self, index: u32) {
        loop {
            if !predicates::can_read(&self.pool, index) {
                break;
            }
            let (read_buf, _, stream) = Self::split_io(self.pool.get_mut(index));
            match read_buf.read_from(stream) {
                Ok(IoOutcome::Progress(n)) => {
                    self.stats.bytes_received += n as u64;
                    self.pool.get_mut(index).last_active = Instant::now();
                    if let Some(peer) = self.pool.peer_of(index) {
                        self.forward_data(index, peer);
                    }
                }
                Ok(IoOutcome::Eof) => {
                    tracing::trace!(slot = index, "connection closed by peer");
                    self.close_pair(index);
                    return;
                }
                Ok(IoOutcome::WouldBlock) => break,
                Err(e) => {
                    if !e.is_quiet() {
                        tracing::debug!(error = %e, "read error");
                    }
                    self.stats.errors += 1;
                    self.close_pair(index);
                    return;
                }
            }
        }
        self.update_interest(index);
        if let Some(peer) = self.pool.peer_of(index) {
            self.update_interest(peer);
        }
    }

    /// HTTP-mode client branch: read until `EAGAIN` or complete,
    /// re-running the framer after every successful read.
    fn read_http_client(&mut self, index: u32) {
        loop {
            if !self.pool.get(index).is_live() {
                return;
            }
            if self.pool.get(index).read_buf.is_full() {
                // No more room to read into; let framing decide — this
                // necessarily resolves as oversize, since a real `Complete`
                // would have been caught on an earlier pass. Either way,
                // nothing further can be read into this slot.
                self.advance_framing(index);
                return;
            }
            let (read_buf, _, stream) = Self::split_io(self.pool.get_mut(index));
            match read_buf.read_from(stream) {
                Ok(IoOutcome::Progress(n)) => {
                    self.stats.bytes_received += n as u64;
                    self.pool.get_mut(index).last_active = Instant::now();
                    if self.advance_framing(index).is_none() {
                        return;
                    }
                }
                Ok(IoOutcome::Eof) => {
                    tracing::trace!(slot = index, "client closed before completing a request");
                    self.close_slot(index);
                    return;
                }
                Ok(IoOutcome::WouldBlock) => break,
                Err(e) => {
                    if !e.is_quiet() {
                        tracing::debug!(error = %e, "client read error");
                    }
                    self.stats.errors += 1;
                    self.close_slot(index);
                    return;
                }
            }
        }
        self.update_interest(index);
    }

    /// Re-runs the framer over the client's buffered prefix. Returns
    /// `Some(())` when the caller should keep reading (`Need`, within
    /// bounds); returns `None` when the connection has been handled
    /// (dispatched, or closed after a synthesized error response) and the
    /// read loop must stop touching this slot.
    fn advance_framing(&mut self, index: u32) -> Option<()> {
        let prefix_len = self.pool.get(index).read_buf.readable();
        match frame_prefix(&self.pool, index) {
            FrameResult::Need => {
                let full = self.pool.get(index).read_buf.is_full();
                if full || prefix_len > self.limits.req.max_request_size {
                    self.stats.requests_error += 1;
                    self.synthesize_and_close(index, StatusCode::PayloadTooLarge);
                    return None;
                }
                Some(())
            }
            FrameResult::Malformed => {
                self.stats.requests_error += 1;
                self.synthesize_and_close(index, StatusCode::BadRequest);
                None
            }
            FrameResult::Complete { method, keep_alive, total_length } => {
                self.stats.record_method(method);
                let slot = self.pool.get_mut(index);
                slot.http.is_complete = true;
                slot.http.keep_alive = keep_alive;
                slot.http.total_length = total_length;
                slot.state = State::RequestComplete;
                self.dispatch(index);
                None
            }
        }
    }

    /// Copies `[src.read_buf.pos..len)` into `dst.write_buf`'s tail, bounded
    /// by `min(source.readable, dest.writable)`.
    fn forward_data(&mut self, src: u32, dst: u32) {
        let (src_slot, dst_slot) = self.pool.get_two_mut(src, dst);
        let copied = dst_slot.write_buf.append(src_slot.read_buf.unread());
        src_slot.read_buf.advance(copied);
        self.stats.bytes_sent += copied as u64;
        let dst_buf = &mut self.pool.get_mut(dst).write_buf;
        if dst_buf.pos() > 0 && dst_buf.writable() < 1024 {
            dst_buf.compact();
        }
    }

    // ---- HTTP dispatch ---------------------------------------------------------

    /// Given a `RequestComplete` client: opens the upstream connection,
    /// copies the framed request across, and starts relaying the response
    /// back.
    fn dispatch(&mut self, client_index: u32) {
        match self.spawn_upstream() {
            Ok(upstream_index) => {
                self.pool.pair(client_index, upstream_index);
                let total_length = self.pool.get(client_index).http.total_length;
                let keep_alive = self.pool.get(client_index).http.keep_alive;

                let copied = {
                    let (client, upstream) = self.pool.get_two_mut(client_index, upstream_index);
                    let available = client.read_buf.unread();
                    let bound = total_length.min(available.len());
                    upstream.write_buf.append(&available[..bound])
                };

                if copied < total_length {
                    self.close_slot(upstream_index);
                    self.stats.requests_error += 1;
                    self.synthesize_and_close(client_index, StatusCode::PayloadTooLarge);
                    return;
                }

                let client = self.pool.get_mut(client_index);
                client.read_buf = Buffer::with_capacity(client.read_buf.capacity());
                client.keep_alive = keep_alive;
                client.state = State::WritingResponse;
                self.update_interest(client_index);
                self.update_interest(upstream_index);
            }
            Err(SpawnError::PoolExhausted) => {
                self.stats.errors += 1;
                self.synthesize_and_close(client_index, StatusCode::ServiceUnavailable);
            }
            Err(SpawnError::Io) => {
                self.stats.errors += 1;
                self.synthesize_and_close(client_index, StatusCode::BadGateway);
            }
        }
    }

    // ---- write ------------------------------------------------------------------

    fn handle_write(&mut self, index: u32) {
        loop {
            if !predicates::can_write(&self.pool, index) {
                break;
            }
            let (_, write_buf, stream) = Self::split_io(self.pool.get_mut(index));
            match write_buf.write_to(stream) {
                Ok(IoOutcome::Progress(0)) => break,
                Ok(IoOutcome::Progress(n)) => {
                    self.stats.bytes_sent += n as u64;
                    self.pool.get_mut(index).last_active = Instant::now();
                }
                Ok(IoOutcome::Eof) => break,
                Ok(IoOutcome::WouldBlock) => break,
                Err(e) => {
                    self.on_write_error(index, &e);
                    return;
                }
            }
        }
        self.after_write(index);
    }

    fn on_write_error(&mut self, index: u32, kind: &Kind) {
        if !kind.is_quiet() {
            tracing::debug!(error = %kind, "write error");
        }
        self.stats.errors += 1;
        if self.mode == Mode::Http && self.pool.get(index).role == Role::Client {
            self.close_slot(index);
        } else {
            self.close_pair(index);
        }
    }

    /// Post-drain bookkeeping: HTTP-mode clients whose response
    /// just fully drained either recycle for another request or close;
    /// everything else just refreshes interest.
    fn after_write(&mut self, index: u32) {
        if !self.pool.get(index).is_live() {
            return;
        }
        let slot = self.pool.get(index);
        let http_response_drained =
            self.mode == Mode::Http && slot.role == Role::Client && slot.state == State::WritingResponse && slot.write_buf.is_empty();

        if http_response_drained {
            self.recycle_or_close_client(index);
        } else {
            self.update_interest(index);
            if let Some(peer) = self.pool.peer_of(index) {
                self.update_interest(peer);
            }
        }
    }

    /// Keep-alive accounting: `requests_handled` never
    /// exceeds `MAX_REQUESTS_PER_CONN`, and a close-triggering breach never
    /// forwards a subsequent request.
    fn recycle_or_close_client(&mut self, index: u32) {
        let slot = self.pool.get(index);
        let keep_alive = slot.keep_alive;
        let cap = self.limits.conn.max_requests_per_connection;
        let under_cap = slot.requests_handled + 1 < cap;

        if keep_alive && under_cap {
            if let Some(upstream) = self.pool.peer_of(index) {
                self.close_slot(upstream);
            }
            let slot = self.pool.get_mut(index);
            slot.requests_handled += 1;
            slot.read_buf = Buffer::with_capacity(slot.read_buf.capacity());
            slot.write_buf = Buffer::with_capacity(slot.write_buf.capacity());
            slot.state = State::ReadingRequest;
            slot.http.reset();
            self.stats.keep_alive_reused += 1;
            self.update_interest(index);
        } else {
            self.close_slot(index);
        }
    }

    /// Fills the client's write buffer with a synthesized error response
    ///, marks the connection non-keep-alive, and flushes immediately so
    /// small error bodies don't wait for the next writable edge.
    fn synthesize_and_close(&mut self, index: u32, status: StatusCode) {
        let slot = self.pool.get_mut(index);
        slot.write_buf.append(status.as_bytes());
        slot.keep_alive = false;
        slot.state = State::WritingResponse;
        self.handle_write(index);
    }

    // ---- teardown ----------------------------------------------------------------

    fn handle_error(&mut self, index: u32) {
        let err = self
            .pool
            .get(index)
            .stream
            .as_ref()
            .and_then(|s| s.take_error().ok().flatten());
        if let Some(e) = &err {
            if !matches!(e.kind(), io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe) {
                tracing::debug!(error = %e, slot = index, "connection error edge");
            }
        }
        self.stats.errors += 1;
        self.close_pair(index);
    }

    fn close_slot(&mut self, index: u32) {
        if !self.pool.get(index).is_live() {
            return;
        }
        {
            let slot = self.pool.get_mut(index);
            if let Some(stream) = slot.stream.as_mut() {
                self.mux.remove(stream);
            }
        }
        self.stats.active_connections = self.stats.active_connections.saturating_sub(1);
        self.pool.free(index);
    }

    /// Snapshots the peer, closes self, then closes the snapshot if
    /// non-null.
    fn close_pair(&mut self, index: u32) {
        let peer = self.pool.peer_of(index);
        self.close_slot(index);
        if let Some(peer_index) = peer {
            self.close_slot(peer_index);
        }
    }

    // ---- interest bookkeeping -------------------------------------------------

    fn update_interest(&mut self, index: u32) {
        if !self.pool.get(index).is_live() {
            return;
        }
        let read = predicates::wants_read(&self.pool, index);
        let write = predicates::wants_write(&self.pool, index);
        // A registration must want *something*, or we'd lose error/hangup
        // detection on an otherwise-idle fd.
        let mask = match (read, write) {
            (true, true) => InterestMask::READ_WRITE,
            (true, false) => InterestMask::READ,
            (false, true) => InterestMask::WRITE,
            (false, false) => InterestMask::READ,
        };
        let slot = self.pool.get_mut(index);
        if let Some(stream) = slot.stream.as_mut() {
            if let Err(e) = self.mux.modify(stream, index as u64, mask) {
                tracing::debug!(error = %e, slot = index, "failed to update readiness interest");
            }
        }
    }

    /// Idle/connect-timeout sweep.
    fn maintenance_tick(&mut self) {
        let now = Instant::now();
        let connect_timeout = self.limits.conn.connect_timeout;
        let idle_timeout = self.limits.conn.idle_timeout;

        let stale: Vec<u32> = self
            .pool
            .iter_live()
            .filter(|&index| {
                let slot = self.pool.get(index);
                let limit = if slot.state == State::Connecting { connect_timeout } else { idle_timeout };
                now.saturating_duration_since(slot.last_active) > limit
            })
            .collect();

        for index in stale {
            if !self.pool.get(index).is_live() {
                continue; // already closed via its peer earlier in this sweep
            }
            tracing::debug!(slot = index, "closing idle connection");
            self.close_pair(index);
        }
    }

    /// Splits a `&mut Slot` into its read buffer, write buffer, and stream
    /// as three independent mutable borrows (disjoint fields) for a single
    /// `Buffer::read_from`/`write_to` call.
    fn split_io(slot: &mut crate::pool::Slot) -> (&mut Buffer, &mut Buffer, &mut mio::net::TcpStream) {
        (
            &mut slot.read_buf,
            &mut slot.write_buf,
            slot.stream.as_mut().expect("live slot has a registered stream"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use std::io::{Read, Write};
    use std::net::TcpListener as StdListener;
    use std::thread;

    fn free_port() -> u16 {
        StdListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    #[test]
    fn stream_passthrough_forwards_bytes_and_counts_them() {
        let backend_port = free_port();
        let backend = StdListener::bind(("127.0.0.1", backend_port)).unwrap();
        let listen_port = free_port();

        let backend_thread = thread::spawn(move || {
            let (mut sock, _) = backend.accept().unwrap();
            let mut buf = Vec::new();
            sock.read_to_end(&mut buf).unwrap();
            buf
        });

        let shutdown = AtomicBool::new(false);
        let mut engine = Engine::init(
            format!("127.0.0.1:{listen_port}").parse().unwrap(),
            format!("127.0.0.1:{backend_port}").parse().unwrap(),
            Mode::Tcp,
            Limits::default(),
        )
        .unwrap();

        let driver = thread::spawn(move || {
            let mut client = std::net::TcpStream::connect(("127.0.0.1", listen_port)).unwrap();
            client.write_all(b"AB").unwrap();
            drop(client);
        });

        // Drive a handful of loop iterations manually instead of calling
        // `run` (which blocks on `wait(1000)` until `shutdown` flips).
        for _ in 0..20 {
            let events = engine.mux.wait(200).unwrap();
            for event in events {
                if event.token == LISTENER_TOKEN {
                    engine.handle_accept();
                    continue;
                }
                let index = event.token as u32;
                if !engine.pool.get(index).is_live() {
                    continue;
                }
                if engine.pool.get(index).state == State::Connecting && event.writable {
                    engine.handle_connect(index);
                }
                if event.writable {
                    engine.handle_write(index);
                }
                if engine.pool.get(index).is_live() && event.readable {
                    engine.handle_read(index);
                }
            }
            if engine.pool.active_count() == 0 && backend_thread.is_finished() {
                break;
            }
        }

        driver.join().unwrap();
        let received = backend_thread.join().unwrap();
        assert_eq!(received, b"AB");
        assert_eq!(engine.stats.bytes_received, 2);
        let _ = shutdown;
    }

    #[test]
    fn pool_exhaustion_rejects_without_evicting() {
        let listen_port = free_port();
        let backend_port = free_port();
        let mut limits = Limits::default();
        limits.server.pool_size = 1;

        let mut engine = Engine::init(
            format!("127.0.0.1:{listen_port}").parse().unwrap(),
            format!("127.0.0.1:{backend_port}").parse().unwrap(),
            Mode::Tcp,
            limits,
        )
        .unwrap();

        // Occupy the single slot directly, bypassing accept, to deterministically
        // simulate exhaustion without racing a real client connection.
        let index = engine.pool.alloc().unwrap();
        engine.pool.get_mut(index).state = State::Connected;

        let _keep_alive_conn = std::net::TcpStream::connect(("127.0.0.1", listen_port));
        let events = engine.mux.wait(500).unwrap();
        for event in events {
            if event.token == LISTENER_TOKEN {
                engine.handle_accept();
            }
        }
        assert_eq!(engine.pool.active_count(), 1);
        assert_eq!(engine.stats.total_connections, 0);
    }
}
