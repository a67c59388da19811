//! Cancellation scopes built on `tokio::sync::watch`.
//!
//! A [`ShutdownTrigger`] owns the flag; every task holds a [`Shutdown`]
//! receiver and selects on [`Shutdown::triggered`]. Dropping the trigger
//! counts as triggering, so a scope can never outlive its owner.

use tokio::sync::watch;

/// Create a new cancellation scope
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Owning side of a cancellation scope
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Cancel every task subscribed to this scope. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// A new receiver for this scope
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receiving side of a cancellation scope
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once the scope is cancelled or its trigger is dropped
    ///
    /// Cancel safe, so it can sit in a `tokio::select!` branch.
    pub async fn triggered(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
