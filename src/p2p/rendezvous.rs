//! Single-slot hand-off points between the notification feed and callers
//! suspended outside the driver lock.

use crate::p2p::error::RendezvousError;
use crate::p2p::types::{Decision, Reason};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};

/// A capacity-one channel that can be signalled from one side of the lock and
/// awaited from the other.
///
/// Signalling a full slot keeps the value already there. Every waiter wakes
/// with [`RendezvousError::Released`] once the owning set is released.
pub struct Slot<T> {
    tx: mpsc::Sender<T>,
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
    released: watch::Receiver<bool>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: Arc::clone(&self.rx),
            released: self.released.clone(),
        }
    }
}

impl<T: Send> Slot<T> {
    fn new(released: watch::Receiver<bool>) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            released,
        }
    }

    /// Deposit `value`. Returns `false` if the slot was full or released.
    pub fn signal(&self, value: T) -> bool {
        if *self.released.borrow() {
            return false;
        }
        match self.tx.try_send(value) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("rendezvous slot already signalled, keeping first value");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Discard a stale value left by an earlier exchange.
    pub fn drain(&self) {
        if let Ok(mut rx) = self.rx.try_lock() {
            while rx.try_recv().is_ok() {}
        }
    }

    /// Wait at most `timeout` for a value.
    pub async fn wait(&self, timeout: Duration) -> Result<T, RendezvousError> {
        let mut released = self.released.clone();
        let mut rx = self.rx.lock().await;

        tokio::select! {
            biased;
            value = rx.recv() => value.ok_or(RendezvousError::Released),
            _ = until_released(&mut released) => Err(RendezvousError::Released),
            _ = tokio::time::sleep(timeout) => Err(RendezvousError::Timeout(timeout)),
        }
    }
}

async fn until_released(flag: &mut watch::Receiver<bool>) {
    loop {
        if *flag.borrow_and_update() {
            return;
        }
        if flag.changed().await.is_err() {
            return;
        }
    }
}

/// The rendezvous points of one protocol instance.
pub struct RendezvousSet {
    /// Outcome of the discovery phase of an outgoing connect.
    pub peer_found: Slot<Result<(), Reason>>,
    /// The application's answer to an incoming connection.
    pub decision: Slot<Decision>,
    /// Disconnect or group removal completed.
    pub disconnected: Slot<()>,
    terminate: watch::Sender<bool>,
}

impl RendezvousSet {
    pub fn new() -> Self {
        let (terminate, flag) = watch::channel(false);
        Self {
            peer_found: Slot::new(flag.clone()),
            decision: Slot::new(flag.clone()),
            disconnected: Slot::new(flag),
            terminate,
        }
    }

    pub fn drain(&self) {
        self.peer_found.drain();
        self.decision.drain();
        self.disconnected.drain();
    }

    /// Wake every waiter and refuse further signals.
    ///
    /// Returns `false` if the set was already released.
    pub fn release(&self) -> bool {
        if self.terminate.send_replace(true) {
            tracing::debug!("rendezvous set already released");
            return false;
        }
        true
    }
}

impl Default for RendezvousSet {
    fn default() -> Self {
        Self::new()
    }
}
