use std::hash::Hash;
use std::sync::Arc;

use futures::StreamExt;
use jobmux_core::{Clock, Event, Job, JobItem};
use tokio::sync::mpsc;

use crate::cancel::CancelSignal;
use crate::error::ManagerError;
use crate::queue::{BlockingQueue, RingQueue};
use crate::registry::{JobContext, Registry};

/// Result of the front transition (§4.4): what the runner should do next.
pub(crate) enum FrontOutcome {
    /// Installed as `Running`; proceed to the body with this job's signal.
    Proceed(CancelSignal),
    /// A prior cancel or a racing cleanup means the body must never run.
    Skip,
    /// The id was already `Running`. Only the `tap` path can observe this.
    Fail(ManagerError),
}

/// The CAS retry loop shared by `submit` and `tap`. `ignore_absence`
/// mirrors spec.md's boolean of the same name: `tap` installs `Running`
/// directly from an absent entry, `submit` treats absence as a no-op (the
/// id was already cleaned up by a cancel that beat this runner to it).
pub(crate) fn front_transition<I>(registry: &Registry<I>, id: &I, ignore_absence: bool) -> FrontOutcome
where
    I: Eq + Hash + Clone,
{
    loop {
        match registry.get(id) {
            Some(ctx) => match ctx.status {
                jobmux_core::Status::Pending => {
                    let signal = CancelSignal::new();
                    let next = JobContext::running(signal.clone());
                    if registry.replace_if_equal(id, &ctx, next) {
                        return FrontOutcome::Proceed(signal);
                    }
                }
                jobmux_core::Status::Canceled => {
                    registry.remove_if_equal(id, &ctx);
                    return FrontOutcome::Skip;
                }
                jobmux_core::Status::Running => return FrontOutcome::Fail(ManagerError::AlreadyRunning),
            },
            None if ignore_absence => {
                let signal = CancelSignal::new();
                let next = JobContext::running(signal.clone());
                if registry.insert_if_absent(id.clone(), next) {
                    return FrontOutcome::Proceed(signal);
                }
            }
            None => return FrontOutcome::Skip,
        }
    }
}

/// Where a runner's `Result` items go. `submit` runners have no result
/// channel and discard them by convention; `tap` runners forward them to
/// the caller's stream.
pub(crate) enum Sink<R> {
    Discard,
    Forward(mpsc::Sender<Result<R, ManagerError>>),
}

enum RunOutcome {
    Completed,
    Failed(anyhow::Error),
    Canceled,
}

/// Drives a job's sequence to completion, routing notifications and
/// results and performing exactly-once termination cleanup (§4.4 Body +
/// Termination). Shared by both `submit`'s dispatcher-scheduled runner and
/// `tap`'s free-standing task.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_body<I, N, R>(
    job: Box<dyn Job<I, N, R>>,
    id: I,
    signal: CancelSignal,
    started_at: i64,
    registry: Arc<Registry<I>>,
    notifications: Arc<BlockingQueue<(I, N)>>,
    events: Arc<RingQueue<Event<I>>>,
    clock: Arc<dyn Clock>,
    sink: Sink<R>,
) where
    I: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    N: Send + 'static,
    R: Send + 'static,
{
    let mut stream = job.into_stream();

    let outcome = loop {
        tokio::select! {
            biased;
            _ = signal.cancelled() => break RunOutcome::Canceled,
            next = stream.next() => {
                match next {
                    None => break RunOutcome::Completed,
                    Some(Err(err)) => break RunOutcome::Failed(err),
                    Some(Ok(JobItem::Notification(n))) => {
                        notifications.enqueue((id.clone(), n)).await;
                    }
                    Some(Ok(JobItem::Result(r))) => {
                        if let Sink::Forward(tx) = &sink {
                            if tx.send(Ok(r)).await.is_err() {
                                // Consumer dropped the stream; nothing left to forward to,
                                // but the body still runs to its own termination below.
                            }
                        }
                    }
                }
            }
        }
    };

    let running_ctx = JobContext::running(signal);
    match outcome {
        RunOutcome::Completed => {
            let duration_ms = (clock.now_millis() - started_at).max(0) as u64;
            registry.remove_if_equal(&id, &running_ctx);
            tracing::debug!(?id, duration_ms, "job completed");
            events.enqueue(Event::Completed { id, started_at, duration_ms });
        }
        RunOutcome::Failed(err) => {
            let duration_ms = (clock.now_millis() - started_at).max(0) as u64;
            registry.remove_if_equal(&id, &running_ctx);
            tracing::warn!(?id, duration_ms, error = %err, "job failed");
            events.enqueue(Event::Failed {
                id,
                started_at,
                duration_ms,
                error: err.to_string(),
            });
        }
        RunOutcome::Canceled => {
            registry.remove_if_equal(&id, &running_ctx);
            tracing::debug!(?id, "job canceled");
        }
    }
}
