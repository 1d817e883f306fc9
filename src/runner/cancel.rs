use std::sync::Arc;
use tokio::sync::watch;

/// Requests cancellation of a running job.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<String>>>,
}

/// Observes cancellation requests. Cheap to clone; every clone sees the same request.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<Option<String>>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(None);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

impl CancelHandle {
    /// Cancels with the given reason. Later calls keep the first reason.
    pub fn cancel<S: Into<String>>(&self, reason: S) {
        let reason = reason.into();
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_handle, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolves with the cancellation reason once cancellation is requested.
    /// Pends forever if every handle is dropped without cancelling.
    pub async fn cancelled(&mut self) -> String {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if let Some(reason) = current {
                return reason;
            }

            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
