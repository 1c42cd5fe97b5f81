//! Command-line surface: flags, defaults, and the validation that
//! turns parsed args into a runnable `Config`.

use crate::limits::Limits;
use clap::{Parser, ValueEnum};
use std::net::Ipv4Addr;

/// Operating mode: protocol-agnostic stream relay, or HTTP/1-aware
/// request dispatch with keep-alive accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Tcp,
    Http,
}

/// `proxy [OPTIONS]`.
#[derive(Debug, Parser)]
#[command(name = "relaida", about = "Single-threaded, edge-triggered reverse proxy")]
pub struct Cli {
    /// Listening bind address.
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen: Ipv4Addr,

    /// Listening port.
    #[arg(short = 'p', long, default_value_t = 8080)]
    pub port: u16,

    /// Backend IPv4 address.
    #[arg(short = 'b', long, default_value = "127.0.0.1")]
    pub backend: Ipv4Addr,

    /// Backend port.
    #[arg(short = 'P', long = "backend-port", default_value_t = 8081)]
    pub backend_port: u16,

    /// Operating mode.
    #[arg(short = 'm', long, value_enum, default_value_t = Mode::Http)]
    pub mode: Mode,
}

/// A validated, ready-to-run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: (Ipv4Addr, u16),
    pub backend: (Ipv4Addr, u16),
    pub mode: Mode,
    pub limits: Limits,
}

#[derive(Debug)]
pub enum ConfigError {
    /// Listen and backend endpoints coincide — would forward to itself.
    ForwardingLoop,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ForwardingLoop => {
                write!(f, "listen and backend endpoints are identical — refusing to proxy to itself")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Cli {
    /// Validates the parsed args into a `Config`, rejecting configurations
    /// where the listen and backend endpoints coincide (a forwarding loop).
    /// A listen port below 1024 is a non-fatal warning, left to the caller
    /// to log via [`listen_port_needs_privilege`](Cli::listen_port_needs_privilege)
    /// so this function stays free of I/O side effects.
    pub fn into_config(self) -> Result<Config, ConfigError> {
        if self.listen == self.backend && self.port == self.backend_port {
            return Err(ConfigError::ForwardingLoop);
        }
        Ok(Config {
            listen: (self.listen, self.port),
            backend: (self.backend, self.backend_port),
            mode: self.mode,
            limits: Limits::default(),
        })
    }

    /// True when `--listen`'s port requires elevated privileges on most
    /// systems (non-fatal; the caller only warns).
    pub fn listen_port_needs_privilege(&self) -> bool {
        self.port < 1024
    }
}
