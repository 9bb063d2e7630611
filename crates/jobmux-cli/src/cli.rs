use clap::Parser;

/// Runs a small scripted scenario against a `jobmux_engine::Manager` and
/// prints its shared notifications/events streams until Ctrl+C or the
/// scenario drains.
#[derive(Debug, Clone, Parser)]
#[command(name = "jobmux", version, about = "jobmux demo: async job coordination manager")]
pub struct Cli {
    /// Dispatch queue capacity; `submit` suspends once saturated.
    #[arg(long, env = "JOBMUX_JOB_LIMIT", default_value_t = 100)]
    pub job_limit: usize,

    /// Notifications queue capacity.
    #[arg(long, env = "JOBMUX_NOTIFICATIONS_LIMIT", default_value_t = 10)]
    pub notifications_limit: usize,

    /// Events ring capacity.
    #[arg(long, env = "JOBMUX_EVENTS_LIMIT", default_value_t = 10)]
    pub events_limit: usize,

    /// Maximum runners executing concurrently.
    #[arg(long, env = "JOBMUX_JOB_CONCURRENCY", default_value_t = 2)]
    pub job_concurrency: u64,

    /// Number of scripted demo jobs to submit.
    #[arg(long, env = "JOBMUX_JOBS", default_value_t = 3)]
    pub jobs: u32,

    /// Notifications emitted by each demo job before it terminates.
    #[arg(long, env = "JOBMUX_TICKS", default_value_t = 4)]
    pub ticks: u32,

    /// If set, every job at this 1-based position in the scenario fails
    /// instead of completing (e.g. `2` fails the second job).
    #[arg(long, env = "JOBMUX_FAIL_AT")]
    pub fail_at: Option<u32>,

    /// Also submit one long-running job and cancel it shortly after, to
    /// demonstrate external cancellation.
    #[arg(long, env = "JOBMUX_DEMO_CANCEL", default_value_t = false)]
    pub demo_cancel: bool,

    /// Also run one job through `tap` instead of `submit`, printing its
    /// results directly rather than only its notifications.
    #[arg(long, env = "JOBMUX_DEMO_TAP", default_value_t = false)]
    pub demo_tap: bool,
}
