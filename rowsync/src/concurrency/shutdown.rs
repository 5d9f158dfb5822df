use std::sync::Arc;

use tokio::sync::watch;

/// Result of an operation that can be interrupted by a shutdown signal.
///
/// [`ShutdownResult::Shutdown`] carries whatever the operation had available when the signal
/// arrived, so that callers can still account for partial progress.
#[derive(Debug, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    Ok(T),
    Shutdown(I),
}

impl<T, I> ShutdownResult<T, I> {
    pub fn should_shutdown(&self) -> bool {
        matches!(self, ShutdownResult::Shutdown(_))
    }
}

/// Receiving side of the shutdown channel.
///
/// A shutdown was requested once [`watch::Receiver::changed`] resolves or
/// [`watch::Receiver::has_changed`] returns `true`.
pub type ShutdownRx = watch::Receiver<()>;

/// Sending side of the shutdown channel.
///
/// The sender is cheaply cloneable and can be handed out to signal handlers.
#[derive(Debug, Clone)]
pub struct ShutdownTx(Arc<watch::Sender<()>>);

impl ShutdownTx {
    /// Wraps the given [`watch::Sender`].
    pub fn wrap(tx: watch::Sender<()>) -> Self {
        Self(Arc::new(tx))
    }

    /// Notifies every subscriber that shutdown is requested.
    ///
    /// Fails when there are no receivers left, meaning that nothing is running anymore.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    /// Creates a new receiver that observes only signals sent after this call.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx::wrap(tx), rx)
}

/// Returns `true` if a shutdown was requested and not yet observed by this receiver.
///
/// A closed channel counts as shutdown, since nobody can resume the worker anymore.
pub fn is_shutdown_requested(shutdown_rx: &ShutdownRx) -> bool {
    shutdown_rx.has_changed().unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_reaches_every_subscriber() {
        let (shutdown_tx, _) = create_shutdown_channel();
        let mut first = shutdown_tx.subscribe();
        let mut second = shutdown_tx.subscribe();

        assert!(!is_shutdown_requested(&first));

        shutdown_tx.shutdown().unwrap();

        assert!(is_shutdown_requested(&first));
        first.changed().await.unwrap();
        second.changed().await.unwrap();
    }

    #[test]
    fn shutdown_without_receivers_fails() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        drop(shutdown_rx);

        assert!(shutdown_tx.shutdown().is_err());
    }
}
