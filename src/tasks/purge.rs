//! Expiry Purge Task
//!
//! Background task that periodically removes expired entries. Stale entries
//! are never served anyway; purging only reclaims memory and disk space.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::codec::Codec;
use crate::memoizer::Memoizer;

/// Spawns a background task that periodically purges expired entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between runs. Each run touches the durable store, so it is executed on
/// the blocking thread pool.
///
/// # Arguments
/// * `memoizer` - The cache context to purge
/// * `interval` - Time between purge runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let memo = Memoizer::new(MemoConfig::default());
/// let purge_handle = spawn_purge_task(memo.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task<C: Codec>(memoizer: Memoizer<C>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting expiry purge task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let memo = memoizer.clone();
            match tokio::task::spawn_blocking(move || memo.purge_expired()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!("Expiry purge failed: {}", err),
                Err(err) => warn!("Expiry purge task panicked: {}", err),
            }
        }
    })
}

/// Spawns the purge task at the memoizer's configured `purge_interval`.
///
/// Returns `None` when no interval is configured.
pub fn spawn_configured_purge_task<C: Codec>(memoizer: Memoizer<C>) -> Option<JoinHandle<()>> {
    let interval = memoizer.config().purge_interval?;
    Some(spawn_purge_task(memoizer, interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;

    use crate::cache::ManualClock;
    use crate::codec::JsonCodec;
    use crate::config::MemoConfig;
    use crate::store::DurableStore;

    fn memoizer(clock: Arc<ManualClock>) -> Memoizer {
        Memoizer::from_parts(
            MemoConfig::default().set_ttl(Duration::from_secs(1)),
            JsonCodec,
            DurableStore::open_in_memory().unwrap(),
            clock,
        )
    }

    #[tokio::test]
    async fn test_purge_task_removes_expired_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let memo = memoizer(clock.clone());
        let op = memo.mark_operation("expire_soon");
        memo.invoke(&op, &(), || Ok::<_, Infallible>(1u32)).unwrap();

        clock.advance(Duration::from_secs(2));
        let handle = spawn_purge_task(memo.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(300)).await;

        let snapshot = memo.dump_state().unwrap();
        assert!(snapshot.is_empty(), "Expired entry should have been purged");

        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_preserves_fresh_entries() {
        let clock = Arc::new(ManualClock::new(0));
        let memo = memoizer(clock);
        let op = memo.mark_operation("long_lived");
        memo.invoke(&op, &(), || Ok::<_, Infallible>(1u32)).unwrap();

        let handle = spawn_purge_task(memo.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = memo.dump_state().unwrap();
        assert_eq!(snapshot.memory.len(), 1, "Fresh entry should not be removed");
        assert_eq!(snapshot.durable.len(), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_configured_interval_drives_purging() {
        let clock = Arc::new(ManualClock::new(0));
        let memo = Memoizer::from_parts(
            MemoConfig::default()
                .set_ttl(Duration::from_millis(1))
                .set_purge_interval(Duration::from_millis(20)),
            JsonCodec,
            DurableStore::open_in_memory().unwrap(),
            clock.clone(),
        );
        let op = memo.mark_operation("short");
        memo.invoke(&op, &(), || Ok::<_, Infallible>(1u32)).unwrap();
        clock.advance(Duration::from_millis(5));

        let handle = spawn_configured_purge_task(memo.clone()).expect("interval is configured");

        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = memo.dump_state().unwrap();
        assert!(snapshot.memory.is_empty());
        assert!(snapshot.durable.is_empty());

        handle.abort();
    }

    #[tokio::test]
    async fn test_no_configured_interval_spawns_nothing() {
        let memo = memoizer(Arc::new(ManualClock::new(0)));
        assert!(spawn_configured_purge_task(memo).is_none());
    }

    #[tokio::test]
    async fn test_purge_task_can_be_aborted() {
        let memo = memoizer(Arc::new(ManualClock::new(0)));

        let handle = spawn_purge_task(memo, Duration::from_secs(1));

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
