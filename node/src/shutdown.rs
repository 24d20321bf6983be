//! Stop signal for the engine loop and the HTTP server.
//!
//! One `broadcast` channel fans the signal out. The engine finishes the claim
//! in hand before it exits; the server stops accepting and drains.

use std::fmt;
use std::sync::OnceLock;

use tokio::signal;
use tokio::sync::broadcast;

/// What stopped the service. Only the first trigger is kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    /// `stop()` was called, or a task asked for it.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
            ShutdownReason::Requested => "requested",
        })
    }
}

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    reason: OnceLock<ShutdownReason>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            reason: OnceLock::new(),
        }
    }

    /// Receivers made after the trigger never see it; check
    /// [`reason`](Self::reason) first.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    pub fn shutdown(&self) {
        self.trigger(ShutdownReason::Requested);
    }

    fn trigger(&self, reason: ShutdownReason) {
        if self.reason.set(reason).is_ok() {
            tracing::info!(%reason, "shutting down");
        }
        let _ = self.tx.send(());
    }

    /// Resolve on SIGINT or SIGTERM and fan the signal out.
    pub async fn wait_for_signal(&self) -> ShutdownReason {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "no SIGTERM handler, only SIGINT stops the service");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        let reason = tokio::select! {
            _ = signal::ctrl_c() => ShutdownReason::Interrupt,
            _ = terminate => ShutdownReason::Terminate,
        };
        self.trigger(reason);
        reason
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn engine_and_server_receivers_both_notified() {
        let controller = ShutdownController::new();
        let mut engine_rx = controller.subscribe();
        let mut server_rx = controller.subscribe();
        controller.shutdown();
        assert!(engine_rx.recv().await.is_ok());
        assert!(server_rx.recv().await.is_ok());
        assert_eq!(controller.reason(), Some(ShutdownReason::Requested));
    }

    #[test]
    fn first_reason_wins() {
        let controller = ShutdownController::default();
        assert_eq!(controller.reason(), None);
        controller.trigger(ShutdownReason::Terminate);
        controller.shutdown();
        assert_eq!(controller.reason(), Some(ShutdownReason::Terminate));
        assert_eq!(ShutdownReason::Terminate.to_string(), "SIGTERM");
    }

    #[tokio::test]
    async fn late_subscriber_relies_on_reason() {
        let controller = ShutdownController::default();
        controller.shutdown();
        let mut late = controller.subscribe();
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert!(controller.reason().is_some());
    }
}
