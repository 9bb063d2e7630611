use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// The per-runner cancellation signal: "a boolean signal with a waiter."
///
/// Installed into a job's `Running` context as its cancel action. Cloning
/// a `CancelSignal` shares the same underlying flag — all clones observe
/// the same raise, which is what lets the registry compare a `Running`
/// context for equality (`Arc::ptr_eq` on the flag) without needing a
/// comparable token type.
#[derive(Clone)]
pub(crate) struct CancelSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancelSignal {
    pub(crate) fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Raise the signal. Idempotent: raising an already-raised signal is a
    /// no-op beyond waking any current waiters.
    pub(crate) fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once the signal has been raised. Safe to call repeatedly
    /// inside a `select!` loop: the waiter is armed via `enable()` before
    /// the flag is checked, so a `cancel()` landing between the check and
    /// the `await` is never missed (plain check-then-`notified().await`
    /// has exactly that gap).
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl PartialEq for CancelSignal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.flag, &other.flag)
    }
}

impl Eq for CancelSignal {}
