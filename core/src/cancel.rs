//! Cooperative cancellation.
//!
//! A `CancelSource` owns the right to cancel; any number of `CancelToken`
//! clones observe it. The reason is written once and never changes. A token
//! may be bound to only one in-flight execution at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Why a request was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    pub message: Option<String>,
}

impl Cancel {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("canceled")
    }
}

/// The cancelling half.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<Option<Cancel>>,
    token: CancelToken,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            tx,
            token: CancelToken {
                rx,
                bound: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Settle the token. Returns false if it was already cancelled.
    pub fn cancel(&self, message: impl Into<String>) -> bool {
        let reason = Cancel::new(message);
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
            true
        })
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// The observing half, handed to a request config.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<Option<Cancel>>,
    bound: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn reason(&self) -> Option<Cancel> {
        self.rx.borrow().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolves with the reason once the source cancels. Pending forever if
    /// the source is dropped first.
    pub async fn cancelled(&self) -> Cancel {
        let mut rx = self.rx.clone();
        if let Ok(slot) = rx.wait_for(Option::is_some).await {
            let reason: Option<Cancel> = (*slot).clone();
            if let Some(reason) = reason {
                return reason;
            }
        }
        std::future::pending().await
    }

    /// Claim the token for one execution. `None` if another execution holds it.
    pub(crate) fn bind(&self) -> Option<Binding> {
        self.bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Binding {
                bound: Arc::clone(&self.bound),
            })
    }
}

/// Releases the token when the execution settles.
#[derive(Debug)]
pub(crate) struct Binding {
    bound: Arc<AtomicBool>,
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.bound.store(false, Ordering::Release);
    }
}
