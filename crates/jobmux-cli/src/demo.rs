use std::time::Duration;

use jobmux_core::{job_from_stream, Job, JobItem};

/// A job that emits `ticks` notifications, one every 150ms, then either
/// completes with a summary `Result` or fails on its last tick.
pub fn progress_job(id: impl Into<String>, ticks: u32, fail: bool) -> Box<dyn Job<String, u32, String>> {
    let id = id.into();
    let state = (0u32, ticks, fail);
    let stream = futures::stream::unfold(state, |(done, total, fail)| async move {
        if done >= total {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        let done = done + 1;
        if done == total {
            if fail {
                return Some((Err(anyhow::anyhow!("simulated failure after {done} ticks")), (done, total, fail)));
            }
            return Some((Ok(JobItem::Result(format!("completed after {done} ticks"))), (done, total, fail)));
        }
        Some((Ok(JobItem::Notification(done)), (done, total, fail)))
    });
    job_from_stream(id, stream)
}

/// A job with no termination of its own, for demonstrating external
/// cancellation: it emits an incrementing notification every 100ms until
/// the manager interrupts it.
pub fn long_running_job(id: impl Into<String>) -> Box<dyn Job<String, u32, String>> {
    let id = id.into();
    let stream = futures::stream::unfold(0u32, |tick| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Some((Ok(JobItem::Notification(tick + 1)), tick + 1))
    });
    job_from_stream(id, stream)
}

/// A job built for `tap`: interleaves one notification with two results,
/// mirroring the scenario in spec.md S5.
pub fn tap_job(id: impl Into<String>) -> Box<dyn Job<String, u32, String>> {
    let id = id.into();
    let items = vec![
        JobItem::Notification(99),
        JobItem::Result("first".to_string()),
        JobItem::Result("second".to_string()),
    ];
    let stream = futures::stream::iter(items.into_iter().map(Ok::<JobItem<u32, String>, anyhow::Error>));
    job_from_stream(id, stream)
}
