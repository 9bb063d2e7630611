mod cli;
mod demo;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use jobmux_core::Event;
use jobmux_engine::{Manager, ManagerConfig};

use crate::cli::Cli;
use crate::shutdown::{spawn_ctrl_c_handler, ShutdownController, ShutdownEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let manager = Arc::new(Manager::<String, u32, String>::new(ManagerConfig {
        job_limit: cli.job_limit,
        notifications_limit: cli.notifications_limit,
        events_limit: cli.events_limit,
        job_concurrency: cli.job_concurrency as usize,
        clock: None,
    }));

    let shutdown = Arc::new(ShutdownController::new());
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::unbounded_channel::<ShutdownEvent>();
    spawn_ctrl_c_handler(shutdown.clone(), shutdown_tx);

    let notifications_task = tokio::spawn({
        let manager = manager.clone();
        async move {
            let mut notifications = manager.notifications();
            while let Some((id, n)) = notifications.next().await {
                println!("notification: {id} -> {n}");
            }
        }
    });

    let events_task = tokio::spawn({
        let manager = manager.clone();
        async move {
            let mut events = manager.events();
            while let Some(event) = events.next().await {
                match event {
                    Event::Completed { id, duration_ms, .. } => {
                        println!("event: {id} completed in {duration_ms}ms");
                    }
                    Event::Failed { id, duration_ms, error, .. } => {
                        println!("event: {id} failed after {duration_ms}ms: {error}");
                    }
                }
            }
        }
    });

    let scenario = tokio::spawn(run_scenario(manager.clone(), cli.clone()));

    tokio::select! {
        _ = scenario => {}
        Some(_) = shutdown_rx.recv() => {
            println!("shutdown requested, draining in-flight jobs");
        }
    }

    manager.shutdown().await;
    let _ = notifications_task.await;
    let _ = events_task.await;
    println!("remaining job ids: {:?}", manager.job_ids());

    Ok(())
}

async fn run_scenario(manager: Arc<Manager<String, u32, String>>, cli: Cli) {
    for i in 1..=cli.jobs {
        let id = format!("job-{i}");
        let fail = cli.fail_at == Some(i);
        let job = demo::progress_job(id.clone(), cli.ticks, fail);
        if manager.submit(job).await {
            println!("submitted {id}");
        } else {
            println!("submit rejected for {id}: id already present");
        }
    }

    if cli.demo_tap {
        let id = "tap-job".to_string();
        let mut results = manager.tap(demo::tap_job(id.clone()));
        while let Some(item) = results.next().await {
            match item {
                Ok(r) => println!("tap {id} result: {r}"),
                Err(err) => println!("tap {id} rejected: {err}"),
            }
        }
    }

    if cli.demo_cancel {
        let id = "long-running".to_string();
        manager.submit(demo::long_running_job(id.clone())).await;
        tokio::time::sleep(Duration::from_millis(350)).await;
        println!("cancelling {id}");
        manager.cancel(&id);
    }
}
