// Cooperative stop signal for the processor loop

use std::time::Duration;
use tokio::sync::watch;

/// Receiving half, checked between cycles and raced against idle sleeps
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// A token whose sender is already gone; it never signals
    pub fn never() -> Self {
        shutdown_channel().1
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop is requested. A sender dropped without
    /// signalling never resolves it.
    pub async fn wait(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Sleep for `pause`; `false` means the sleep was cut short by a stop
    pub async fn sleep(&mut self, pause: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(pause) => true,
            _ = self.wait() => false,
        }
    }
}

pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Request a stop; repeated calls are harmless
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}
