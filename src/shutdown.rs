//! Shutdown escalation channel.
//!
//! One logical event, many possible signalers: any in-flight request whose
//! chain surfaces an integrity violation asks for shutdown, and several
//! may do so in the same instant. The channel has capacity one and
//! signaling is `try_send` — a full slot means somebody already asked, and
//! the extra signal is dropped without blocking or failing the caller.
//!
//! Exactly one consumer — the server supervisor — receives the event and
//! begins the drain, once.

use tokio::sync::mpsc;

/// Creates a connected signal/receiver pair.
pub fn shutdown_channel() -> (ShutdownSignal, ShutdownReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (ShutdownSignal { tx }, ShutdownReceiver { rx })
}

/// The signaling side. Cheap to clone; held by the dispatcher and anything
/// else allowed to request termination.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: mpsc::Sender<String>,
}

impl ShutdownSignal {
    /// Requests a graceful shutdown. Non-blocking and idempotent from the
    /// caller's perspective: a second signal is silently a no-op.
    pub fn signal(&self, reason: impl Into<String>) {
        let _ = self.tx.try_send(reason.into());
    }
}

/// The consuming side, owned by the process supervisor.
pub struct ShutdownReceiver {
    rx: mpsc::Receiver<String>,
}

impl ShutdownReceiver {
    /// Resolves with the first signaled reason.
    ///
    /// If every signaler has been dropped without signaling, there is
    /// nothing left to escalate — the future stays pending so a
    /// supervisor `select!` falls through to its other arms.
    pub async fn recv(&mut self) -> String {
        match self.rx.recv().await {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}
