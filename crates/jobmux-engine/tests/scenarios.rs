use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use jobmux_core::{job_from_stream, Event, FixedClock, JobItem, Status};
use jobmux_engine::{Manager, ManagerConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn finite_job(id: &str, notifications: Vec<u32>) -> Box<dyn jobmux_core::Job<String, u32, String>> {
    let items: Vec<anyhow::Result<JobItem<u32, String>>> = notifications
        .into_iter()
        .map(JobItem::Notification)
        .chain(std::iter::once(JobItem::Result("ok".to_string())))
        .map(Ok)
        .collect();
    job_from_stream(id.to_string(), futures::stream::iter(items))
}

fn failing_job(id: &str, notifications: Vec<u32>) -> Box<dyn jobmux_core::Job<String, u32, String>> {
    let mut items: Vec<anyhow::Result<JobItem<u32, String>>> =
        notifications.into_iter().map(|n| Ok(JobItem::Notification(n))).collect();
    items.push(Err(anyhow::anyhow!("boom")));
    job_from_stream(id.to_string(), futures::stream::iter(items))
}

fn long_running_job(id: &str) -> Box<dyn jobmux_core::Job<String, u32, String>> {
    let stream = futures::stream::unfold(0u32, |tick| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Some((Ok(JobItem::Notification(tick + 1)), tick + 1))
    });
    job_from_stream(id.to_string(), stream)
}

// S1: three jobs complete, six notifications in per-id order, three Completed events,
// jobIds empty afterward.
#[tokio::test]
async fn three_jobs_complete_cleanly() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig {
        job_limit: 4,
        notifications_limit: 8,
        events_limit: 4,
        job_concurrency: 2,
        clock: None,
    });

    for id in ["a", "b", "c"] {
        assert!(manager.submit(finite_job(id, vec![1, 2])).await);
    }

    let mut seen: std::collections::HashMap<String, Vec<u32>> = std::collections::HashMap::new();

    // Drain using a try_dequeue polling loop.
    let mut notifications = Vec::new();
    let mut events = Vec::new();
    let start = tokio::time::Instant::now();
    while (notifications.len() < 6 || events.len() < 3) && start.elapsed() < Duration::from_secs(2) {
        if let Some(mut batch) = manager.last_notifications(16).await {
            notifications.append(&mut batch);
        }
        if let Some(mut batch) = manager.last_events(16) {
            events.append(&mut batch);
        }
        if notifications.len() < 6 || events.len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    assert_eq!(notifications.len(), 6);
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| matches!(e, Event::Completed { .. })));

    for (id, n) in &notifications {
        seen.entry(id.clone()).or_default().push(*n);
    }
    for id in ["a", "b", "c"] {
        assert_eq!(seen.get(id).unwrap(), &vec![1, 2]);
    }

    // Give the registry a moment to settle after the last removeIfEqual.
    let mut remaining = manager.job_ids();
    let start = tokio::time::Instant::now();
    while !remaining.is_empty() && start.elapsed() < Duration::from_secs(1) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        remaining = manager.job_ids();
    }
    assert!(remaining.is_empty());
}

// S2: resubmitting an in-flight id fails; exactly one Completed event is emitted.
#[tokio::test]
async fn resubmitting_in_flight_id_is_rejected() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig::default());

    assert!(manager.submit(finite_job("a", vec![1, 2, 3])).await);
    assert!(!manager.submit(finite_job("a", vec![9])).await);

    let mut events = Vec::new();
    let start = tokio::time::Instant::now();
    while events.is_empty() && start.elapsed() < Duration::from_secs(2) {
        if let Some(mut batch) = manager.last_events(16) {
            events.append(&mut batch);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::Completed { id, .. } if id == "a"));
}

// S3: cancelling a long-running job stops its notifications and leaves no event or registry entry.
#[tokio::test]
async fn cancel_stops_long_running_job() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig::default());

    assert!(manager.submit(long_running_job("a")).await);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(manager.status(&"a".to_string()), Some(Status::Running));

    manager.cancel(&"a".to_string());

    let start = tokio::time::Instant::now();
    while manager.status(&"a".to_string()).is_some() && start.elapsed() < Duration::from_secs(1) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.status(&"a".to_string()), None);

    // No event emitted for the cancelled job.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = manager.last_events(16).unwrap();
    assert!(events.iter().all(|e| e.id() != "a"));

    // Manager remains healthy for new submissions.
    assert!(manager.submit(finite_job("b", vec![1])).await);
}

// S4: a job that fails after one notification produces exactly one Failed event.
#[tokio::test]
async fn failing_job_emits_failed_event() {
    init_tracing();
    let clock = Arc::new(FixedClock::new(1_000));
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig {
        clock: Some(clock.clone() as Arc<dyn jobmux_core::Clock>),
        ..ManagerConfig::default()
    });

    assert!(manager.submit(failing_job("a", vec![1])).await);
    clock.advance(250);

    let mut events = Vec::new();
    let start = tokio::time::Instant::now();
    while events.is_empty() && start.elapsed() < Duration::from_secs(2) {
        if let Some(mut batch) = manager.last_events(16) {
            events.append(&mut batch);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(events.len(), 1);
    match &events[0] {
        Event::Failed { id, duration_ms, error, .. } => {
            assert_eq!(id, "a");
            assert_eq!(*duration_ms, 250);
            assert!(error.contains("boom"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(manager.status(&"a".to_string()), None);
}

// S5: tap delivers Results directly while the Notification is routed to the shared stream.
#[tokio::test]
async fn tap_delivers_results_and_routes_notifications() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig::default());

    let items = vec![
        JobItem::Notification(99),
        JobItem::Result("first".to_string()),
        JobItem::Result("second".to_string()),
    ];
    let job = job_from_stream(
        "a".to_string(),
        futures::stream::iter(items.into_iter().map(Ok::<JobItem<u32, String>, anyhow::Error>)),
    );

    let results: Vec<_> = manager.tap(job).collect().await;
    let results: Vec<_> = results.into_iter().map(|r| r.expect("tap should not fail")).collect();
    assert_eq!(results, vec!["first".to_string(), "second".to_string()]);

    let mut notifications = Vec::new();
    let start = tokio::time::Instant::now();
    while notifications.is_empty() && start.elapsed() < Duration::from_secs(1) {
        if let Some(mut batch) = manager.last_notifications(16).await {
            notifications.append(&mut batch);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(notifications, vec![("a".to_string(), 99)]);

    let mut events = Vec::new();
    let start = tokio::time::Instant::now();
    while events.is_empty() && start.elapsed() < Duration::from_secs(1) {
        if let Some(mut batch) = manager.last_events(16) {
            events.append(&mut batch);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(matches!(&events[0], Event::Completed { id, .. } if id == "a"));
}

// Tap colliding with an already-running id fails eagerly with AlreadyRunning.
#[tokio::test]
async fn tap_collision_fails_eagerly() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig::default());

    assert!(manager.submit(long_running_job("a")).await);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(manager.status(&"a".to_string()), Some(Status::Running));

    let mut results = manager.tap(long_running_job("a"));
    let first = results.next().await.expect("collision yields exactly one item");
    assert!(first.is_err());
    assert!(results.next().await.is_none());

    manager.cancel(&"a".to_string());
}

// S6: with jobConcurrency=1, a second submission stays Pending until the first finishes.
#[tokio::test]
async fn concurrency_cap_holds_second_job_pending() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig {
        job_concurrency: 1,
        ..ManagerConfig::default()
    });

    assert!(manager.submit(long_running_job("a")).await);
    assert!(manager.submit(finite_job("b", vec![1])).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.status(&"a".to_string()), Some(Status::Running));
    assert_eq!(manager.status(&"b".to_string()), Some(Status::Pending));

    manager.cancel(&"a".to_string());

    let start = tokio::time::Instant::now();
    while manager.status(&"b".to_string()) == Some(Status::Pending) && start.elapsed() < Duration::from_secs(1) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_ne!(manager.status(&"b".to_string()), Some(Status::Pending));
}

// B1: submit suspends the caller once jobLimit is saturated; the job is
// visible as Pending in the registry throughout the suspension.
#[tokio::test]
async fn submit_suspends_caller_when_job_limit_saturated() {
    init_tracing();
    let manager: Arc<Manager<String, u32, String>> = Arc::new(Manager::new(ManagerConfig {
        job_limit: 1,
        job_concurrency: 1,
        ..ManagerConfig::default()
    }));

    assert!(manager.submit(long_running_job("a")).await);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(manager.status(&"a".to_string()), Some(Status::Running));

    // Dequeued by the dispatcher, which then blocks acquiring a permit "a"
    // already holds; the dispatch queue's one buffer slot is free again.
    assert!(manager.submit(long_running_job("b")).await);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(manager.status(&"b".to_string()), Some(Status::Pending));

    // Fills the dispatch queue's one buffer slot.
    assert!(manager.submit(long_running_job("c")).await);

    // jobLimit=1 is now fully saturated: one item buffered, one held by the
    // dispatcher waiting on a permit. This submit must suspend the caller.
    let background_manager = manager.clone();
    let handle = tokio::spawn(async move { background_manager.submit(long_running_job("d")).await });
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(!handle.is_finished(), "submit should still be suspended while jobLimit is saturated");
    assert_eq!(manager.status(&"d".to_string()), Some(Status::Pending));
    assert!(manager.job_ids().contains(&"d".to_string()));

    handle.abort();
    manager.cancel(&"a".to_string());
    manager.cancel(&"b".to_string());
    manager.cancel(&"c".to_string());
}

// R2: an id is reusable once its prior job has fully terminated.
#[tokio::test]
async fn id_is_reusable_after_termination() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig::default());

    assert!(manager.submit(finite_job("a", vec![1])).await);
    let start = tokio::time::Instant::now();
    while manager.status(&"a".to_string()).is_some() && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.status(&"a".to_string()), None);

    assert!(manager.submit(finite_job("a", vec![2])).await);
}

// R1 / B3: cancel is idempotent and a Pending cancel prevents body execution entirely.
#[tokio::test]
async fn cancel_pending_job_prevents_body_execution() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig {
        job_concurrency: 1,
        ..ManagerConfig::default()
    });

    assert!(manager.submit(long_running_job("a")).await);
    assert!(manager.submit(finite_job("b", vec![1, 2])).await);
    assert_eq!(manager.status(&"b".to_string()), Some(Status::Pending));

    manager.cancel(&"b".to_string());
    manager.cancel(&"b".to_string()); // idempotent

    let start = tokio::time::Instant::now();
    while manager.status(&"b".to_string()).is_some() && start.elapsed() < Duration::from_secs(1) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.status(&"b".to_string()), None);

    manager.cancel(&"a".to_string());
    let mut events = Vec::new();
    let start = tokio::time::Instant::now();
    while start.elapsed() < Duration::from_millis(300) {
        if let Some(mut batch) = manager.last_events(16) {
            events.append(&mut batch);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(events.iter().all(|e| e.id() != "b"));
}

// B2: eventsLimit=1 with two rapid terminations, only the newer event survives.
#[tokio::test]
async fn events_ring_drops_oldest_on_overflow() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig {
        events_limit: 1,
        job_concurrency: 2,
        ..ManagerConfig::default()
    });

    assert!(manager.submit(finite_job("a", vec![])).await);
    assert!(manager.submit(finite_job("b", vec![])).await);

    let start = tokio::time::Instant::now();
    while manager.job_ids().len() > 0 && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let events = manager.last_events(16).unwrap();
    assert_eq!(events.len(), 1);
}

// Manager shutdown closes the public streams.
#[tokio::test]
async fn shutdown_terminates_streams() {
    init_tracing();
    let manager: Manager<String, u32, String> = Manager::new(ManagerConfig::default());
    let mut notifications = manager.notifications();
    let mut events = manager.events();

    manager.shutdown().await;

    assert!(notifications.next().await.is_none());
    assert!(events.next().await.is_none());
}
