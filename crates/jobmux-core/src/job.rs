use std::pin::Pin;

use futures::Stream;

/// A boxed, pinned, `Send` stream — the shape every `Job` reduces to.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// One element of a job's sequence: either progress the caller wants
/// aggregated onto the shared notifications stream, or a value the `tap`
/// caller wants delivered directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobItem<N, R> {
    /// Progress/telemetry, routed to the manager's shared notifications
    /// stream as `(id, N)`.
    Notification(N),
    /// A value handed back to a `tap` caller. Jobs submitted via `submit`
    /// may still produce these; the manager simply discards them, since
    /// `submit` has no result channel.
    Result(R),
}

/// A unit of work identified by `id`, producing a lazy sequence of
/// [`JobItem`]s.
///
/// The manager treats a job as opaque: it neither interprets `N`/`R` nor
/// knows how the sequence is produced. It only drives `into_stream` to
/// completion, routing notifications and results as they arrive, and
/// converts a stream error into a single `Event::Failed`.
pub trait Job<I, N, R>: Send + 'static {
    /// The job's identifier. Called once, before the stream is consumed.
    fn id(&self) -> I;

    /// Consume the job, producing its lazy sequence.
    fn into_stream(self: Box<Self>) -> BoxStream<'static, anyhow::Result<JobItem<N, R>>>;
}

struct StreamJob<I, S> {
    id: I,
    stream: S,
}

impl<I, N, R, S> Job<I, N, R> for StreamJob<I, S>
where
    I: Clone + Send + 'static,
    N: Send + 'static,
    R: Send + 'static,
    S: Stream<Item = anyhow::Result<JobItem<N, R>>> + Send + 'static,
{
    fn id(&self) -> I {
        self.id.clone()
    }

    fn into_stream(self: Box<Self>) -> BoxStream<'static, anyhow::Result<JobItem<N, R>>> {
        Box::pin(self.stream)
    }
}

/// Adapt any [`Stream`] of [`JobItem`]s into a [`Job`], for callers who
/// would rather build a stream (e.g. with `async_stream::try_stream!` or
/// `futures::stream::iter`) than implement the trait by hand.
pub fn job_from_stream<I, N, R, S>(id: I, stream: S) -> Box<dyn Job<I, N, R>>
where
    I: Clone + Send + 'static,
    N: Send + 'static,
    R: Send + 'static,
    S: Stream<Item = anyhow::Result<JobItem<N, R>>> + Send + 'static,
{
    Box::new(StreamJob { id, stream })
}
