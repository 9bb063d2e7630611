use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, Stream};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};

/// Bounded queue that suspends the producer on `enqueue` when full, used
/// for the dispatch queue and the notifications queue (§4.2: backpressure
/// is the core's only throttle on producers).
///
/// The receiver lives behind an async mutex so both `stream()` (the
/// long-lived external consumer) and `try_dequeue_up_to` (a one-shot
/// peek-and-drain) can share it; spec.md treats these as alternative ways
/// of draining the same queue, never concurrent readers of it.
pub(crate) struct BlockingQueue<T> {
    tx: mpsc::Sender<T>,
    rx: AsyncMutex<mpsc::Receiver<T>>,
    closed: AtomicBool,
    close_notify: Notify,
}

impl<T: Send + 'static> BlockingQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: AsyncMutex::new(rx),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    /// Suspends iff the queue is at capacity. A post-close enqueue is a
    /// benign no-op (spec.md §7: "Queue closed").
    pub(crate) async fn enqueue(&self, item: T) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(item).await;
    }

    /// Marks the queue closed and wakes anyone blocked in `dequeue_one`.
    /// Closing does not forcibly drop the sender: runners only ever reach
    /// this queue through `enqueue`, so there is nothing else to drain
    /// before treating "closed and empty" as end-of-stream.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.close_notify.notify_waiters();
    }

    async fn dequeue_one(&self) -> Option<T> {
        loop {
            let notified = self.close_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut rx = self.rx.lock().await;
                match rx.try_recv() {
                    Ok(item) => return Some(item),
                    Err(mpsc::error::TryRecvError::Disconnected) => return None,
                    Err(mpsc::error::TryRecvError::Empty) => {}
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
                // Race the channel itself against the close signal so a
                // producer enqueuing while we're about to sleep is not
                // missed, and so `close()` wakes us even with nothing queued.
                tokio::select! {
                    biased;
                    item = rx.recv() => return item,
                    _ = notified => continue,
                }
            }
        }
    }

    /// Non-blocking peek-and-drain of up to `n` items. `None` only when
    /// the queue is closed and has nothing left; an empty `Vec` means
    /// merely empty.
    pub(crate) async fn try_dequeue_up_to(&self, n: usize) -> Option<Vec<T>> {
        let mut rx = self.rx.lock().await;
        let mut out = Vec::with_capacity(n.min(64));
        for _ in 0..n {
            match rx.try_recv() {
                Ok(item) => out.push(item),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }
        if out.is_empty() && self.closed.load(Ordering::Acquire) {
            None
        } else {
            Some(out)
        }
    }

    pub(crate) fn stream(self: Arc<Self>) -> impl Stream<Item = T> + Send + 'static {
        stream::unfold(self, |queue| async move {
            let item = queue.dequeue_one().await?;
            Some((item, queue))
        })
    }
}

/// Bounded, oldest-dropping ring buffer, used for the events queue
/// (§4.2): producers never suspend, so a runner's teardown can never
/// stall behind a slow events consumer.
pub(crate) struct RingQueue<T> {
    capacity: usize,
    items: SyncMutex<VecDeque<T>>,
    notify: Notify,
    closed: AtomicBool,
}

impl<T: Send + 'static> RingQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: SyncMutex::new(VecDeque::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Never suspends. Drops the oldest element when at capacity.
    pub(crate) fn enqueue(&self, item: T) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut items = self.items.lock();
            if items.len() >= self.capacity {
                items.pop_front();
            }
            items.push_back(item);
        }
        self.notify.notify_waiters();
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) fn try_dequeue_up_to(&self, n: usize) -> Option<Vec<T>> {
        let mut items = self.items.lock();
        let take = n.min(items.len());
        let out: Vec<T> = items.drain(..take).collect();
        drop(items);
        if out.is_empty() && self.closed.load(Ordering::Acquire) {
            None
        } else {
            Some(out)
        }
    }

    async fn dequeue_one(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.items.lock().pop_front() {
                return Some(item);
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    pub(crate) fn stream(self: Arc<Self>) -> impl Stream<Item = T> + Send + 'static {
        stream::unfold(self, |queue| async move {
            let item = queue.dequeue_one().await?;
            Some((item, queue))
        })
    }
}
