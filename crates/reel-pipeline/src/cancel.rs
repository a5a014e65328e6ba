//! Cooperative cancellation.
//!
//! Aborts are observed between items of a fanned-out batch, never
//! mid-item, so already-persisted artifacts stay valid for a future
//! resume.

use tokio::sync::watch;

/// Sender half; hand this to whatever surfaces the user's abort.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half; checked cooperatively by batch workers.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// A token that can never fire, for non-interactive runs and tests.
    pub fn never() -> Self {
        cancel_pair().1
    }
}

/// Create a connected handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}
