// Bounded concurrency - run batches of futures with at most N in flight

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Shared cap on in-flight work.
///
/// Clones share one set of permits, so every batch joined through any clone
/// counts against the same limit.
#[derive(Debug, Clone)]
pub struct Limiter {
    permits: Arc<Semaphore>,
}

impl Limiter {
    /// A limit of zero is treated as one
    pub fn new(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Permits not currently held
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Await every future, each holding a permit while it runs.
    ///
    /// Results come back in input order regardless of completion order. Tasks
    /// must not join through the same limiter themselves.
    pub async fn join<I, F, T>(&self, tasks: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T>,
    {
        let permits = &self.permits;

        join_all(tasks.into_iter().map(|task| async move {
            // The semaphore is never closed, so acquire cannot fail
            let _permit = permits.acquire().await;
            task.await
        }))
        .await
    }
}

/// Await every future with a limit private to this batch
pub async fn join_bounded<I, F, T>(limit: usize, tasks: I) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = T>,
{
    Limiter::new(limit).join(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_preserves_order() {
        let results = join_bounded(
            2,
            (0..5u64).map(|i| async move {
                tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
                i
            }),
        )
        .await;

        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_respects_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        join_bounded(
            3,
            (0..10).map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }),
        )
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_zero_limit_still_runs() {
        let results = join_bounded(0, (0..3).map(|i| async move { i * 2 })).await;
        assert_eq!(results, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_shared_limiter_caps_concurrent_batches() {
        let limiter = Limiter::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let batch = |limiter: Limiter| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                limiter
                    .join((0..4).map(|_| {
                        let in_flight = Arc::clone(&in_flight);
                        let peak = Arc::clone(&peak);
                        async move {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                        }
                    }))
                    .await
            }
        };

        tokio::join!(
            batch(limiter.clone()),
            batch(limiter.clone()),
            batch(limiter.clone())
        );

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(limiter.available(), 2);
    }
}
