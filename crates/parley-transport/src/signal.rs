//! One-way "this connection is closed" latch shared by the connection
//! implementations.

use tokio::sync::watch;

#[derive(Debug)]
pub(crate) struct CloseSignal {
    tx: watch::Sender<bool>,
}

impl CloseSignal {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Flips the latch. Returns `true` only for the call that closed it.
    pub(crate) fn close(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Resolves once the latch is closed.
    pub(crate) async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
