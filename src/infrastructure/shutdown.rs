use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast-backed shutdown signal shared by the scheduler and the HTTP
/// server. Cloning is cheap; every clone observes the same signal, including
/// waiters that subscribe after the signal fired.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<broadcast::Sender<()>>,
    fired: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(1);
        Self {
            tx: Arc::new(tx),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resolves once [`ShutdownSignal::shutdown`] has been called.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // the signal may have fired before we subscribed
        if self.fired.load(Ordering::SeqCst) {
            return;
        }
        let _ = rx.recv().await;
    }

    pub fn shutdown(&self) {
        self.fired.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
