//! Bounded pool for CPU-bound inference jobs
//!
//! Jobs run on a fixed-size rayon pool; the caller gets a future that resolves
//! when the job finishes, so the async request loop never blocks on numeric
//! work.

use crate::{Error, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Fixed-size worker pool returning results through futures
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<ThreadPool>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` worker threads
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::Config("worker pool size must be > 0".into()));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("kicau-worker-{}", i))
            .panic_handler(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                log::error!("Inference worker panicked: {}", message);
            })
            .build()
            .map_err(|e| Error::Config(format!("Failed to build worker pool: {}", e)))?;

        log::debug!("Started worker pool with {} threads", size);

        Ok(Self {
            pool: Arc::new(pool),
            size,
        })
    }

    /// Number of worker threads
    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `job` on the pool right away and return a future for its result.
    ///
    /// Submitted jobs always run to completion; dropping the future only
    /// discards the result.
    pub fn submit<T, F>(&self, job: F) -> impl Future<Output = Result<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            // Receiver may be gone if the request was abandoned
            let _ = tx.send(job());
        });

        async move {
            rx.await
                .map_err(|_| Error::Inference("worker stopped before finishing the job".into()))?
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("size", &self.size).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(WorkerPool::new(0).is_err());
    }

    #[test]
    fn test_runs_job() {
        let pool = WorkerPool::new(2).unwrap();
        let value = runtime().block_on(pool.submit(|| Ok(21 * 2))).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_job_error_propagates() {
        let pool = WorkerPool::new(1).unwrap();
        let result: Result<()> =
            runtime().block_on(pool.submit(|| Err(Error::Preprocessing("bad".into()))));
        assert!(matches!(result, Err(Error::Preprocessing(_))));
    }

    #[test]
    fn test_panicking_job_reports_error() {
        let pool = WorkerPool::new(1).unwrap();
        let result: Result<()> = runtime().block_on(pool.submit(|| panic!("boom")));
        assert!(matches!(result, Err(Error::Inference(_))));

        // Pool still serves jobs afterwards
        assert_eq!(runtime().block_on(pool.submit(|| Ok(1))).unwrap(), 1);
    }

    #[test]
    fn test_jobs_run_in_parallel() {
        let pool = WorkerPool::new(4).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let rt = runtime();
        let results = rt.block_on(async {
            let jobs = (0..4).map(|i| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                pool.submit(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(100));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                })
            });
            let mut out = Vec::new();
            for job in jobs.collect::<Vec<_>>() {
                out.push(job.await.unwrap());
            }
            out
        });

        assert_eq!(results, vec![0, 1, 2, 3]);
        assert!(peak.load(Ordering::SeqCst) > 1);
    }
}
