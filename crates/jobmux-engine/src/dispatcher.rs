use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::queue::BlockingQueue;

/// A runner: a boxed future producing no observable items, matching
/// spec.md's description of the dispatch queue's payload.
pub(crate) type DispatchItem = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Drains the dispatch queue, running up to `concurrency` runners
/// concurrently. Mirrors the teacher's `JoinSet`-based worker pool in
/// `engine.rs`, gated here by a `Semaphore` instead of a fixed channel of
/// worker slots since runners are one-shot futures rather than persistent
/// workers.
///
/// Returns once the dispatch queue closes and every in-flight runner has
/// been drained, satisfying the shutdown contract in spec.md §5.
pub(crate) async fn run_dispatcher(queue: Arc<BlockingQueue<DispatchItem>>, concurrency: usize) {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set: JoinSet<()> = JoinSet::new();
    let mut stream = std::pin::pin!(queue.stream());

    loop {
        tokio::select! {
            biased;
            Some(_) = join_set.join_next(), if !join_set.is_empty() => {}
            item = stream.next() => {
                match item {
                    Some(runner) => {
                        let permit = semaphore
                            .clone()
                            .acquire_owned()
                            .await
                            .expect("dispatcher semaphore is never closed");
                        join_set.spawn(async move {
                            runner.await;
                            drop(permit);
                        });
                    }
                    None => break,
                }
            }
        }
    }

    tracing::debug!("dispatch queue closed, draining in-flight runners");
    while join_set.join_next().await.is_some() {}
}
