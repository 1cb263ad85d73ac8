//! Shutdown coordination for the listeners.
//!
//! ```text
//! signals::shutdown_on_signal ─┐
//!                              ├─▶ Shutdown::trigger ─▶ broadcast
//! tests / embedding code ──────┘        │
//!                     ┌─────────────────┼──────────────────────┐
//!                     ▼                 ▼                      ▼
//!          HttpServer::run     HttpServer::run_tls    redirect listener
//!          (plain listener)    (Handle drain)         (resubscribed receiver)
//! ```
//!
//! Receivers must be taken before the listener future is first polled;
//! a trigger sent before `subscribe` is not replayed.

use tokio::sync::broadcast;

/// One-shot stop signal shared by the serving listener and, in TLS mode,
/// the plaintext redirect listener.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for one listener. `run_tls` resubscribes it for the redirect
    /// listener, so a single receiver covers both.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Stop accepting connections everywhere and let in-flight composites
    /// finish. Harmless when nothing is listening.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Listeners that have not yet stopped.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
