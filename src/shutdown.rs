// Cooperative shutdown signal, passed by value into every long-running loop.
//
// Replaces the process-wide atomic flag the original implementation sets from
// a signal handler: the signal handler here only ever calls `cancel()` on a
// handle, and every loop awaits `cancelled()` on its own cloned token.

use tokio::sync::watch;

#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

pub fn shutdown_channel() -> (ShutdownHandle, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownToken { rx })
}

impl ShutdownHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel()` has been called on the paired handle.
    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                // Handle dropped without ever cancelling; treat as cancelled
                // so loops don't spin forever on a vanished shutdown signal.
                break;
            }
        }
    }
}
