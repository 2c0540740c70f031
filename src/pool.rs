//! A bounded pool for background work.
//!
//! The pool runs fire-and-forget futures on the Tokio runtime while
//! limiting how many of them make progress at the same time. Submitting
//! never waits: every submission becomes a task that first waits for a
//! permit of the pool's semaphore. Closing the pool makes all tasks still
//! waiting for a permit return without running their future.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::trace;

//------------ WorkerPool ----------------------------------------------------

/// A pool of background tasks with bounded concurrency.
#[derive(Clone, Debug)]
pub struct WorkerPool {
    /// The name of the pool used in log messages.
    name: &'static str,

    /// Maximum number of futures running at the same time.
    max_parallel: usize,

    /// The permits for running a future.
    semaphore: Arc<Semaphore>,

    /// Number of futures submitted so far.
    submitted: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Creates a new pool running at most `max_parallel` futures.
    ///
    /// A value of zero is treated as one.
    pub fn new(name: &'static str, max_parallel: usize) -> Self {
        let max_parallel = max_parallel.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            name,
            max_parallel,
            semaphore: Arc::new(Semaphore::new(max_parallel)),
            submitted: Default::default(),
        }
    }

    /// Submits a future for execution.
    ///
    /// This requires a Tokio runtime. The future is dropped without being
    /// polled if the pool is closed before it gets to run.
    pub fn submit<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let semaphore = self.semaphore.clone();
        let name = self.name;
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                trace!("{name}: pool closed, dropping task");
                return;
            };
            fut.await
        });
    }

    /// Closes the pool.
    ///
    /// Futures already running are not affected.
    pub fn close(&self) {
        self.semaphore.close()
    }

    /// Returns whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Returns the number of futures currently running.
    pub fn in_flight(&self) -> usize {
        self.max_parallel
            .saturating_sub(self.semaphore.available_permits())
    }

    /// Returns the number of futures submitted since creation.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Returns the maximum number of futures running at the same time.
    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }
}

//============ Testing =======================================================
