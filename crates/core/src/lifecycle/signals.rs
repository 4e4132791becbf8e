//! OS termination requests.
//!
//! SIGINT and SIGTERM (Ctrl-C and Ctrl-Break on Windows) are treated the
//! same: either one ends the run.

use std::future::Future;
use std::io;
use std::pin::Pin;

use super::event::TerminalEvent;

/// Resolves once a termination request arrives. Never times out.
pub type SignalFuture = Pin<Box<dyn Future<Output = TerminalEvent> + Send>>;

/// Something that can deliver a termination request.
///
/// `register` runs synchronously before any work is started, so a request
/// that arrives between registration and the first poll of the returned
/// future is still observed.
pub trait SignalSource {
    fn register(self) -> io::Result<SignalFuture>;
}

/// The process's real signal handlers. Must be registered from within a
/// tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSignals;

impl SignalSource for OsSignals {
    #[cfg(unix)]
    fn register(self) -> io::Result<SignalFuture> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        tracing::debug!("registered SIGINT and SIGTERM handlers");

        Ok(Box::pin(async move {
            let name = tokio::select! {
                _ = interrupt.recv() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            };
            tracing::info!(signal = name, "termination requested");
            TerminalEvent::Signal(name)
        }))
    }

    #[cfg(not(unix))]
    fn register(self) -> io::Result<SignalFuture> {
        use tokio::signal::windows;

        let mut ctrl_c = windows::ctrl_c()?;
        let mut ctrl_break = windows::ctrl_break()?;
        tracing::debug!("registered Ctrl-C and Ctrl-Break handlers");

        Ok(Box::pin(async move {
            let name = tokio::select! {
                _ = ctrl_c.recv() => "CTRL_C",
                _ = ctrl_break.recv() => "CTRL_BREAK",
            };
            tracing::info!(signal = name, "termination requested");
            TerminalEvent::Signal(name)
        }))
    }
}
