//! Expiration Sweeper
//!
//! Background task that periodically schedules a sweep of expired entries.
//! The sweep itself runs on the eviction worker like any other queued op.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::ops::{CacheOp, MutationQueue};

/// Spawns a task that enqueues an expiration sweep every `interval`.
///
/// The task sleeps first, then enqueues, and repeats until `shutdown` is
/// cancelled or the worker has gone away.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(&runtime, queue.clone(), Duration::from_secs(300), token.clone());
/// // Later, during shutdown:
/// token.cancel();
/// handle.await?;
/// ```
pub(crate) fn spawn_cleanup_task<K, V>(
    runtime: &Handle,
    queue: MutationQueue<K, V>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    runtime.spawn(async move {
        info!(
            "Starting expiration sweeper with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let (reply, removed) = tokio::sync::oneshot::channel();
            if !queue.push(CacheOp::SweepExpired {
                now: None,
                reply: Some(reply),
            }) {
                break;
            }

            // Wait for the result so each pass gets logged; cancellation wins.
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = removed => match result {
                    Ok(0) => debug!("Expiration sweep: no expired entries found"),
                    Ok(count) => info!("Expiration sweep: removed {} expired entries", count),
                    Err(_) => break,
                },
            }
        }

        debug!("Expiration sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ops::channel;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_enqueues_after_each_interval() {
        let (queue, mut receiver) = channel::<&'static str, u32>();
        let probe = queue.clone();
        let token = CancellationToken::new();
        let handle = spawn_cleanup_task(
            &Handle::current(),
            queue,
            Duration::from_secs(300),
            token.clone(),
        );

        // Nothing before the first interval elapses
        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(probe.pending(), 0);

        for _ in 0..2 {
            let op = receiver.recv().await.unwrap();
            assert_eq!(op.name(), "sweep");
            if let CacheOp::SweepExpired { reply: Some(reply), now } = op {
                assert!(now.is_none());
                reply.send(0).unwrap();
            }
            receiver.complete();
        }

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_cancel_while_sleeping() {
        let (queue, _receiver) = channel::<&'static str, u32>();
        let token = CancellationToken::new();
        let handle = spawn_cleanup_task(
            &Handle::current(),
            queue,
            Duration::from_secs(3600),
            token.clone(),
        );

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_worker_gone() {
        let (queue, receiver) = channel::<&'static str, u32>();
        drop(receiver);
        let handle = spawn_cleanup_task(
            &Handle::current(),
            queue,
            Duration::from_secs(1),
            CancellationToken::new(),
        );

        handle.await.unwrap();
    }
}
