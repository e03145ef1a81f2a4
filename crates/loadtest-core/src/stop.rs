//! One-shot broadcast stop signal

use std::sync::Arc;

use tokio::sync::watch;

/// A flag that moves once from unset to set and wakes every waiter.
///
/// Clones share the same flag. Any clone may trigger it; exactly one
/// `trigger` call observes the transition.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Set the flag. Returns `false` if it was already set.
    pub fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the flag is set. Returns immediately if it already is.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
