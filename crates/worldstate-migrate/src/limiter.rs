use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Number of heavy I/O operations (media probing, transcoding, hashing)
/// allowed to run at once: half the available processing units, at least 1.
pub fn default_heavy_io_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

/// A counting permit pool shared by every step of a migration run.
///
/// Create it once at process start and put it in the execution context;
/// clones share the same permits.
///
/// # Example
///
/// ```
/// use worldstate_migrate::IoLimiter;
///
/// let limiter = IoLimiter::new(2);
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
///
/// let sizes: Result<Vec<usize>, std::io::Error> = rt.block_on(
///     limiter.try_join_all(["a.mp3", "b.mp3", "c.mp3"].map(|name| async move { Ok(name.len()) })),
/// );
/// assert_eq!(sizes.unwrap(), vec![5, 5, 5]);
/// ```
#[derive(Debug, Clone)]
pub struct IoLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl IoLimiter {
    /// A pool with `permits` slots (at least 1).
    pub fn new(permits: usize) -> Self {
        let capacity = permits.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// A pool sized by [`default_heavy_io_concurrency`].
    pub fn from_available_parallelism() -> Self {
        Self::new(default_heavy_io_concurrency())
    }

    /// Total number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit, then drive `task` to completion while holding it.
    pub async fn run<F: Future>(&self, task: F) -> F::Output {
        // The semaphore is never closed, so acquiring only fails if that
        // invariant is broken; the task still runs in that case.
        let _permit = self.semaphore.acquire().await.ok();
        task.await
    }

    /// Run a batch of fallible tasks concurrently, each under a permit.
    ///
    /// Fails with the first error; results keep the input order.
    pub async fn try_join_all<I, F, T, E>(&self, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        futures::future::try_join_all(tasks.into_iter().map(|task| self.run(task))).await
    }
}

impl Default for IoLimiter {
    fn default() -> Self {
        Self::from_available_parallelism()
    }
}
