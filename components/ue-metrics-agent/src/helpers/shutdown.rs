// External crates
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Process wide shutdown handle, built on-top of a `CancellationToken`
///
/// - Cloned into each long running task (poll loop, metrics endpoint).
/// - Each task awaits `.cancelled()` inside its `tokio::select!`.
/// - Calling `.trigger()` cancels every clone at once.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for tasks that take a bare `CancellationToken`.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    #[instrument(
        name = "ue_metrics_shutdown::trigger",
        target = "helpers::shutdown",
        skip_all,
        level = "trace"
    )]
    pub fn trigger(&self) {
        tracing::trace!("Shutdown triggered, cancelling all tasks");
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once `.trigger()` has been called on any clone.
    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// Spawn a task that triggers shutdown on Ctrl-C, or SIGTERM on unix.
    pub fn listen_for_signals(&self) {
        let shutdown = self.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            tracing::info!("Stopping UE metrics monitor");
            shutdown.trigger();
        });
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler, using Ctrl-C only");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
            return;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        }
        _ = terminate.recv() => tracing::debug!("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
}
