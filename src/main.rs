//! Process entry point: CLI parsing, logging setup, signal disposition, and
//! the run-until-shutdown lifecycle.
//!
//! Installs a `SIGPIPE` ignore so a write to a half-closed peer surfaces as
//! `EPIPE` instead of killing the process, routes `SIGINT`/`SIGTERM` to a
//! shared shutdown flag rather than terminating immediately, parses and
//! validates configuration, then hands off to the event loop until it
//! returns.

use clap::Parser;
use relaida::cli::Cli;
use relaida::engine::Engine;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signum: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Ignores `SIGPIPE` and routes `SIGINT`/`SIGTERM` to the shared
/// shutdown flag the event loop polls once per iteration.
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
        libc::signal(libc::SIGINT, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGTERM, request_shutdown as libc::sighandler_t);
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn main() -> ExitCode {
    init_logging();
    install_signal_handlers();

    let cli = Cli::parse();
    if cli.listen_port_needs_privilege() {
        tracing::warn!(port = cli.port, "listen port requires elevated privileges on most systems");
    }

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let listen_addr = SocketAddr::from((config.listen.0, config.listen.1));
    let backend_addr = SocketAddr::from((config.backend.0, config.backend.1));

    let mut engine = match Engine::init(listen_addr, backend_addr, config.mode, config.limits) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize proxy");
            return ExitCode::FAILURE;
        }
    };

    let result = engine.run(&SHUTDOWN);
    let stats = engine.shutdown();
    tracing::debug!(?stats, "final statistics");

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "event loop terminated with an error");
            ExitCode::FAILURE
        }
    }
}
