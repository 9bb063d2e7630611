use serde::{Deserialize, Serialize};

/// A lifecycle event emitted exactly once per job that reaches a terminal
/// outcome other than external cancellation.
///
/// No event is emitted for a cancelled job — cancellation is silent by
/// design (see the manager's cancellation semantics); clients observe it
/// via `status` returning absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event<I> {
    /// The job's sequence exhausted normally.
    Completed {
        /// Job identifier.
        id: I,
        /// Epoch-millis timestamp captured when the job started.
        started_at: i64,
        /// Wall-clock duration from start to completion, in milliseconds.
        duration_ms: u64,
    },
    /// The job's sequence raised during iteration.
    Failed {
        /// Job identifier.
        id: I,
        /// Epoch-millis timestamp captured when the job started.
        started_at: i64,
        /// Wall-clock duration from start to failure, in milliseconds.
        duration_ms: u64,
        /// Human-readable error description. The manager never re-raises
        /// the underlying error to its own caller; this is the only trace
        /// of it.
        error: String,
    },
}

impl<I> Event<I> {
    /// The job id this event is about.
    pub fn id(&self) -> &I {
        match self {
            Event::Completed { id, .. } => id,
            Event::Failed { id, .. } => id,
        }
    }
}
