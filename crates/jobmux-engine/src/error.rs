use thiserror::Error;

/// The one structural error the manager surfaces to callers (§7: every
/// other failure mode is either a `bool`, a silent no-op, or an
/// `Event::Failed`).
#[derive(Debug, Clone, Error)]
pub enum ManagerError {
    /// A `tap()` front transition found the id already `Running`. Only
    /// reachable when the same id is tapped twice, or tapped while a
    /// `submit` for it is already running.
    #[error("job is already running")]
    AlreadyRunning,
}
