use serde::{Deserialize, Serialize};

/// A job's position in the registry's lifecycle.
///
/// `Completed` and `Failed` are deliberately absent here: they are event
/// kinds, not registry states. A job reaching either is removed from the
/// registry, not transitioned into a new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Accepted by `submit`/`tap`, not yet picked up by a runner.
    Pending,
    /// A runner has installed its cancellation signal and is iterating the
    /// job's sequence.
    Running,
    /// Cancelled while still `Pending`. Transient: exists only until the
    /// runner (or a resubmission) observes it and removes the entry.
    Canceled,
}
