use std::hash::Hash;
use std::sync::Arc;

use futures::stream;
use jobmux_core::{BoxStream, Clock, Event, Job, Status, SystemClock};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::dispatcher::{run_dispatcher, DispatchItem};
use crate::error::ManagerError;
use crate::lifecycle::{front_transition, run_body, FrontOutcome, Sink};
use crate::queue::{BlockingQueue, RingQueue};
use crate::registry::{JobContext, Registry};

/// Recognized construction options (spec.md §9). Defaults match spec.md's
/// `create()` defaults.
#[derive(Clone)]
pub struct ManagerConfig {
    /// Capacity of the dispatch queue; `submit` suspends once saturated.
    pub job_limit: usize,
    /// Capacity of the notifications queue; runners suspend once saturated.
    pub notifications_limit: usize,
    /// Capacity of the events ring; oldest event is dropped on overflow.
    pub events_limit: usize,
    /// Maximum runners executing concurrently.
    pub job_concurrency: usize,
    /// Clock override, for tests that need deterministic durations.
    pub clock: Option<Arc<dyn Clock>>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            job_limit: 100,
            notifications_limit: 10,
            events_limit: 10,
            job_concurrency: 100,
            clock: None,
        }
    }
}

/// The job coordination manager (spec.md §2 component G plus §6's full
/// public surface). Monomorphic per instance over id type `I`,
/// notification payload `N`, and result type `R`.
///
/// Not `Clone`. Dropping a `Manager` runs the same shutdown sequence as
/// [`Manager::shutdown`], best-effort: queues are closed and the registry
/// is cleared synchronously, but in-flight runners are aborted rather than
/// awaited to completion. Call `shutdown().await` explicitly to drain them.
pub struct Manager<I, N, R> {
    registry: Arc<Registry<I>>,
    dispatch: Arc<BlockingQueue<DispatchItem>>,
    notifications: Arc<BlockingQueue<(I, N)>>,
    events: Arc<RingQueue<Event<I>>>,
    clock: Arc<dyn Clock>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl<I, N, R> Manager<I, N, R>
where
    I: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    N: Send + 'static,
    R: Send + 'static,
{
    /// Allocates queues and starts the dispatcher. Zero-valued limits are
    /// clamped up to 1, matching the teacher's defaulting of a zero-valued
    /// `EngineConfig`.
    pub fn new(config: ManagerConfig) -> Self {
        let job_limit = config.job_limit.max(1);
        let notifications_limit = config.notifications_limit.max(1);
        let events_limit = config.events_limit.max(1);
        let job_concurrency = config.job_concurrency.max(1);
        let clock = config.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let registry = Arc::new(Registry::new());
        let dispatch = Arc::new(BlockingQueue::new(job_limit));
        let notifications = Arc::new(BlockingQueue::new(notifications_limit));
        let events = Arc::new(RingQueue::new(events_limit));

        let dispatcher = tokio::spawn(run_dispatcher(dispatch.clone(), job_concurrency));

        tracing::debug!(
            job_limit,
            notifications_limit,
            events_limit,
            job_concurrency,
            "manager started"
        );

        Self {
            registry,
            dispatch,
            notifications,
            events,
            clock,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Inserts a `Pending` entry and enqueues a runner onto the dispatch
    /// queue (may suspend). Returns `false` without touching the queue if
    /// `id` already has a registry entry.
    pub async fn submit(&self, job: Box<dyn Job<I, N, R>>) -> bool {
        let id = job.id();
        if !self.registry.insert_if_absent(id.clone(), JobContext::pending()) {
            tracing::debug!(?id, "submit rejected: id already present");
            return false;
        }

        let started_at = self.clock.now_millis();
        let registry = self.registry.clone();
        let notifications = self.notifications.clone();
        let events = self.events.clone();
        let clock = self.clock.clone();
        let runner_id = id.clone();

        let runner: DispatchItem = Box::pin(async move {
            match front_transition(&registry, &runner_id, false) {
                FrontOutcome::Proceed(signal) => {
                    run_body(
                        job,
                        runner_id,
                        signal,
                        started_at,
                        registry,
                        notifications,
                        events,
                        clock,
                        Sink::Discard,
                    )
                    .await;
                }
                FrontOutcome::Skip => {}
                FrontOutcome::Fail(_) => {
                    // Reachable: a concurrent tap() on the same id can win the
                    // Pending -> Running CAS before this runner is polled. The
                    // submitted job is then silently dropped, no event emitted.
                    // A deliberate, non-deterministic outcome of racing submit
                    // and tap against the same id.
                }
            }
        });

        self.dispatch.enqueue(runner).await;
        tracing::debug!(?id, "submit accepted");
        true
    }

    /// Runs the front transition synchronously, then returns a stream of
    /// the job's `Result` items. A collision with an already-`Running` id
    /// surfaces as the stream's one and only item, decided at `tap()` call
    /// time rather than at stream-consumption time (§9 open question).
    pub fn tap(&self, job: Box<dyn Job<I, N, R>>) -> BoxStream<'static, Result<R, ManagerError>> {
        let id = job.id();

        match front_transition(&self.registry, &id, true) {
            FrontOutcome::Fail(err) => {
                tracing::debug!(?id, "tap rejected: already running");
                Box::pin(stream::once(async move { Err::<R, ManagerError>(err) }))
            }
            FrontOutcome::Skip => Box::pin(stream::empty::<Result<R, ManagerError>>()),
            FrontOutcome::Proceed(signal) => {
                let registry = self.registry.clone();
                let notifications = self.notifications.clone();
                let events = self.events.clone();
                let clock = self.clock.clone();
                let started_at = clock.now_millis();
                let runner_id = id.clone();
                let (tx, rx) = mpsc::channel(1);

                tokio::spawn(async move {
                    run_body(
                        job,
                        runner_id,
                        signal,
                        started_at,
                        registry,
                        notifications,
                        events,
                        clock,
                        Sink::Forward(tx),
                    )
                    .await;
                });

                tracing::debug!(?id, "tap started");
                Box::pin(ReceiverStream::new(rx))
            }
        }
    }

    /// Asynchronous cancel (spec.md §4.4 `cancel`): idempotent, silent on
    /// unknown or already-terminated ids.
    pub fn cancel(&self, id: &I) {
        loop {
            let Some(ctx) = self.registry.get(id) else {
                return;
            };
            match ctx.status {
                Status::Running => {
                    if let Some(signal) = &ctx.cancel {
                        signal.cancel();
                    }
                    tracing::debug!(?id, "cancel signaled running job");
                    return;
                }
                Status::Pending => {
                    if self.registry.replace_if_equal(id, &ctx, JobContext::canceled()) {
                        tracing::debug!(?id, "cancel marked pending job canceled");
                        return;
                    }
                    // Lost the race to the runner's front transition; retry and
                    // observe whatever it left behind (almost certainly Running).
                }
                Status::Canceled => return,
            }
        }
    }

    /// Plain registry read.
    pub fn status(&self, id: &I) -> Option<Status> {
        self.registry.get(id).map(|ctx| ctx.status)
    }

    /// Snapshot of all ids currently in the registry.
    pub fn job_ids(&self) -> Vec<I> {
        self.registry.keys()
    }

    /// Best-effort peek-and-drain of up to `n` queued notifications.
    pub async fn last_notifications(&self, n: usize) -> Option<Vec<(I, N)>> {
        self.notifications.try_dequeue_up_to(n).await
    }

    /// Best-effort peek-and-drain of up to `n` queued events.
    pub fn last_events(&self, n: usize) -> Option<Vec<Event<I>>> {
        self.events.try_dequeue_up_to(n)
    }

    /// The shared notifications stream. Terminates at shutdown.
    pub fn notifications(&self) -> BoxStream<'static, (I, N)> {
        Box::pin(self.notifications.clone().stream())
    }

    /// The shared events stream. Terminates at shutdown.
    pub fn events(&self) -> BoxStream<'static, Event<I>> {
        Box::pin(self.events.clone().stream())
    }

    /// Closes both streams and clears the registry concurrently (spec.md
    /// §5 shutdown), then awaits the dispatcher draining its in-flight
    /// runners to completion.
    pub async fn shutdown(&self) {
        self.close_queues();
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::debug!("manager shutdown complete");
    }

    fn close_queues(&self) {
        self.dispatch.close();
        self.notifications.close();
        self.events.close();
        self.registry.clear();
    }
}

impl<I, N, R> Drop for Manager<I, N, R>
where
    I: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    N: Send + 'static,
    R: Send + 'static,
{
    fn drop(&mut self) {
        self.close_queues();
        if let Some(handle) = self.dispatcher.lock().take() {
            handle.abort();
        }
    }
}
