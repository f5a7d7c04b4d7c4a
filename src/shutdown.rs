// ===============================
// src/shutdown.rs
// ===============================
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// Cooperative interrupt flag. The refresh loop polls it between steps; a
/// request already in flight always runs to completion.
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Spawn a Ctrl+C listener that flips the flag
    pub fn spawn_signal_handler(&self) {
        let tx = Arc::clone(&self.tx);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, finishing current step then shutting down");
                let _ = tx.send(true);
            }
        });
    }

    #[cfg(test)]
    pub fn trigger(&self) { let _ = self.tx.send(true); }

    pub fn is_triggered(&self) -> bool { *self.rx.borrow() }

    /// Sleep for `dur`; returns `true` if woken early by an interrupt.
    pub async fn sleep(&self, dur: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        let mut rx = self.rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(dur) => self.is_triggered(),
            res = rx.wait_for(|v| *v) => res.is_ok(),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self { Self::new() }
}
