//! Waiting for the user to interrupt a running command.

use tokio::signal;
use tracing::warn;

/// Which signal ended the wait.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) enum Interrupt {
    CtrlC,
    Terminate,
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
pub(super) async fn interrupted() -> Interrupt {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut terminate) => tokio::select! {
                interrupt = ctrl_c() => interrupt,
                _ = terminate.recv() => Interrupt::Terminate,
            },
            Err(err) => {
                warn!(?err, "SIGTERM handler unavailable; only Ctrl-C interrupts");
                ctrl_c().await
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c().await
    }
}

async fn ctrl_c() -> Interrupt {
    if let Err(err) = signal::ctrl_c().await {
        warn!(?err, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
    Interrupt::CtrlC
}
