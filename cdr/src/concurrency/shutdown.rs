//! Shutdown signalling for the ingestion loop.
//!
//! Wraps a watch channel: the transmitter is held by whoever decides to stop the
//! process, receivers are polled by the coordinator between ticks.

use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Requests shutdown. Every current and future receiver observes it.
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }

    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been requested.
    ///
    /// Also resolves when every transmitter is dropped, since no one is left to keep
    /// the process running.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|shutdown| *shutdown).await;
    }
}

/// Creates a new shutdown channel in the running state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receivers_observe_shutdown() {
        let (tx, mut rx) = create_shutdown_channel();
        let mut late = tx.subscribe();
        assert!(!rx.is_shutdown());

        tx.shutdown();

        rx.wait().await;
        late.wait().await;
        assert!(rx.is_shutdown());
        assert!(tx.subscribe().is_shutdown());
    }

    #[tokio::test]
    async fn dropping_the_transmitter_releases_waiters() {
        let (tx, mut rx) = create_shutdown_channel();
        drop(tx);

        rx.wait().await;
        assert!(!rx.is_shutdown());
    }
}
