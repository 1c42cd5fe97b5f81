//! relaida - a single-threaded, edge-triggered reverse proxy.
//!
//! Two operating modes, selected with `--mode`:
//!
//! - **`tcp`**: opaque byte relay between a client and one backend, with no
//!   protocol awareness beyond the bytes themselves.
//! - **`http`** (default): frames each HTTP/1.0-or-1.1 request off the wire
//!   before opening the backend connection, and reuses a client connection
//!   across requests when the framed request asked for keep-alive.
//!
//! One thread runs one `mio::Poll::poll` loop over a fixed-size pool of
//! connection slots (see [`pool`]); nothing here spawns a thread per
//! connection or hands work to an async runtime. See [`engine`] for the
//! dispatcher that ties the pieces together.
//!
//! # Quick start
//!
//! ```no_run
//! use relaida::cli::{Cli, Mode};
//! use relaida::engine::Engine;
//! use clap::Parser;
//! use std::net::{Ipv4Addr, SocketAddr};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = Cli::parse().into_config().expect("valid configuration");
//! let listen = SocketAddr::from((config.listen.0, config.listen.1));
//! let backend = SocketAddr::from((config.backend.0, config.backend.1));
//! let mut engine = Engine::init(listen, backend, config.mode, config.limits).unwrap();
//! let shutdown = AtomicBool::new(false);
//! engine.run(&shutdown).unwrap();
//! ```

pub mod buffer;
pub mod cli;
pub mod engine;
pub mod errors;
pub mod http {
    pub mod framer;
    pub mod status;
    pub mod types;
}
pub mod limits;
pub mod mux;
pub mod pool;
pub mod stats;

pub use crate::{
    cli::{Cli, Config, Mode},
    engine::Engine,
    errors::Kind,
    limits::Limits,
    stats::Stats,
};
