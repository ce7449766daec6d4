//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) and, on unix, SIGTERM
//! - Report which signal ended the wait
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that fails to install is logged and never fires, so the
//!   other sources can still end the wait

use std::fmt;

/// Why the termination hook woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// SIGINT / Ctrl+C.
    Interrupt,
    /// SIGTERM.
    Terminate,
    /// `Shutdown::trigger` was called.
    Triggered,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Interrupt => f.write_str("SIGINT"),
            ExitReason::Terminate => f.write_str("SIGTERM"),
            ExitReason::Triggered => f.write_str("shutdown trigger"),
        }
    }
}

/// Wait for the first process termination signal.
pub async fn wait_for_exit_signal() -> ExitReason {
    let interrupt = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => ExitReason::Interrupt,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending().await
            }
        }
    };

    tokio::select! {
        reason = interrupt => reason,
        reason = terminate() => reason,
    }
}

#[cfg(unix)]
async fn terminate() -> ExitReason {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
            ExitReason::Terminate
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            std::future::pending().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() -> ExitReason {
    std::future::pending().await
}
