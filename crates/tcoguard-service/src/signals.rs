//! Termination signal handling.

use crate::error::{ServiceError, ServiceResult};

/// Installed SIGINT and SIGTERM handlers.
///
/// Installing early means a signal that arrives during startup is held
/// until the supervisor is ready to clean up.
#[derive(Debug)]
pub struct Signals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    /// Install the handlers.
    ///
    /// # Errors
    ///
    /// Returns `Signal` if the runtime cannot register a handler.
    #[cfg(unix)]
    pub fn install() -> ServiceResult<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        let interrupt = signal(SignalKind::interrupt()).map_err(|source| ServiceError::Signal {
            signal: "SIGINT",
            source,
        })?;
        let terminate = signal(SignalKind::terminate()).map_err(|source| ServiceError::Signal {
            signal: "SIGTERM",
            source,
        })?;
        Ok(Self {
            interrupt,
            terminate,
        })
    }

    /// Install the handlers.
    ///
    /// # Errors
    ///
    /// Never fails on this platform; Ctrl+C is registered lazily.
    #[cfg(not(unix))]
    pub fn install() -> ServiceResult<Self> {
        Ok(Self {})
    }

    /// Wait for the first termination signal and name it.
    #[cfg(unix)]
    pub async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    /// Wait for Ctrl+C.
    #[cfg(not(unix))]
    pub async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Error waiting for Ctrl+C");
        }
        "Ctrl+C"
    }
}
