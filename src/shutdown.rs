//! Cooperative shutdown signalling for background tasks.

use tokio::sync::watch;

/// Owner side: flips every paired [`Shutdown`] to triggered.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Task side: resolves [`Shutdown::wait`] once shutdown is triggered or
/// the trigger is dropped.
#[derive(Clone, Debug)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl ShutdownTrigger {
    pub fn channel() -> (Self, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, Shutdown { rx })
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until shutdown is triggered.
    pub async fn wait(&mut self) {
        // An error means the trigger was dropped, which also ends the task.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
