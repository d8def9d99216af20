//! A bounded-concurrency worker pool shared by the read dispatcher's
//! get and compute pools (spec.md §5: these are sized independently).
//! Built on a semaphore rather than `LendingPool`, since there is no
//! resource to check out — just a concurrency ceiling and a queue-depth
//! gauge to report against it.

use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::IntGauge;
use tokio::sync::Semaphore;

#[derive(Debug)]
pub struct PoolClosed;

pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    queue_depth: IntGauge,
    in_flight: AtomicI64,
}

impl WorkerPool {
    pub fn new(capacity: usize, queue_depth: IntGauge) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            queue_depth,
            in_flight: AtomicI64::new(0),
        }
    }

    pub fn queue_depth(&self) -> i64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Runs `fut` once a slot is free, returning its output and how long
    /// the caller waited for a slot. Never blocks the calling task inline:
    /// the wait is the semaphore acquire, which yields back to the runtime.
    pub async fn submit<F>(&self, fut: F) -> Result<(F::Output, Duration), PoolClosed>
    where
        F: Future + Send,
    {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.inc();
        let started = Instant::now();
        let permit = self.semaphore.acquire().await.map_err(|_| PoolClosed);
        let wait = started.elapsed();
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
        self.queue_depth.dec();
        let permit = permit?;
        let output = fut.await;
        drop(permit);
        Ok((output, wait))
    }

    pub fn capacity(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::IntGauge;

    fn gauge() -> IntGauge {
        IntGauge::new("test_queue_depth", "help").unwrap()
    }

    #[tokio::test]
    async fn runs_submitted_work_and_reports_wait() {
        let pool = WorkerPool::new(2, gauge());
        let (value, wait) = pool.submit(async { 7 }).await.unwrap();
        assert_eq!(value, 7);
        assert!(wait < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn bounds_concurrency_to_capacity() {
        let pool = Arc::new(WorkerPool::new(1, gauge()));
        let (tx, rx) = tokio::sync::oneshot::channel();
        let pool_a = pool.clone();
        let first = tokio::spawn(async move {
            pool_a
                .submit(async move {
                    rx.await.ok();
                })
                .await
        });
        tokio::task::yield_now().await;
        assert_eq!(pool.capacity(), 0);
        tx.send(()).unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(pool.capacity(), 1);
    }
}
