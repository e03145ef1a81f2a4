//! Rendezvous channel for ticks
//!
//! A tick is only handed over to a worker that is already waiting for one,
//! so the dispatcher can probe for an idle worker without queuing work.
//! Idle workers park a `oneshot` slot in a shared queue; sending a tick
//! fills the oldest parked slot.

use tokio::sync::{mpsc, oneshot};

type Slot = oneshot::Sender<()>;

/// Create a connected tick sender and receiver.
pub(crate) fn channel() -> (TickSender, TickReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TickSender { idle: rx }, TickReceiver { idle: tx })
}

/// Why a tick could not be handed over without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TryTickError {
    /// No worker is waiting right now.
    NoIdleWorker,
    /// Every receiver has been dropped.
    Closed,
}

/// Dispatcher side. Dropping it closes the channel and releases parked workers.
#[derive(Debug)]
pub(crate) struct TickSender {
    idle: mpsc::UnboundedReceiver<Slot>,
}

impl TickSender {
    /// Hand a tick to a waiting worker without blocking.
    pub(crate) fn try_send(&mut self) -> Result<(), TryTickError> {
        loop {
            match self.idle.try_recv() {
                Ok(slot) => {
                    // A slot whose worker has gone away is skipped.
                    if slot.send(()).is_ok() {
                        return Ok(());
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => return Err(TryTickError::NoIdleWorker),
                Err(mpsc::error::TryRecvError::Disconnected) => return Err(TryTickError::Closed),
            }
        }
    }

    /// Wait for a worker to become idle and hand it a tick.
    ///
    /// Cancel safe: if the future is dropped, no tick has been delivered.
    pub(crate) async fn send(&mut self) -> Result<(), TryTickError> {
        while let Some(slot) = self.idle.recv().await {
            if slot.send(()).is_ok() {
                return Ok(());
            }
        }
        Err(TryTickError::Closed)
    }

    /// Close the channel and release every parked worker.
    ///
    /// A worker may be mid-way through parking when the channel closes, so
    /// slots are drained until every in-flight send has landed.
    pub(crate) async fn close(mut self) {
        self.idle.close();
        while self.idle.recv().await.is_some() {}
    }
}

/// Worker side. Cloned once per worker.
#[derive(Debug, Clone)]
pub(crate) struct TickReceiver {
    idle: mpsc::UnboundedSender<Slot>,
}

impl TickReceiver {
    /// Wait for the next tick. `None` once the sender is gone.
    pub(crate) async fn recv(&self) -> Option<()> {
        let (slot, tick) = oneshot::channel();
        self.idle.send(slot).ok()?;
        tick.await.ok()
    }
}
