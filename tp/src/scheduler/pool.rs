//! Worker pool implementation

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Task {0} cancelled")]
    Cancelled(String),

    #[error("Worker pool closed")]
    Closed,
}

/// Pool statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub running: usize,
    pub peak_concurrent: usize,
    pub total_completed: u64,
    pub total_cancelled: u64,
}

/// Fixed-size pool of task slots
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    stats: Arc<Mutex<PoolStats>>,
}

/// Decrements the running count however the task ends
struct RunningGuard {
    stats: Arc<Mutex<PoolStats>>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.stats.lock().running -= 1;
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        debug!(%size, "WorkerPool::new: called");
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            stats: Arc::new(Mutex::new(PoolStats {
                size,
                ..Default::default()
            })),
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.lock().clone()
    }

    /// Run `task` once a slot is free
    pub async fn run<F, T>(&self, label: &str, cancel: &CancellationToken, task: F) -> Result<T, PoolError>
    where
        F: Future<Output = T>,
    {
        debug!(%label, "WorkerPool::run: called");
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.stats.lock().total_cancelled += 1;
                return Err(PoolError::Cancelled(label.to_string()));
            }
            permit = self.semaphore.acquire() => permit.map_err(|_| PoolError::Closed)?,
        };

        let _guard = {
            let mut stats = self.stats.lock();
            stats.running += 1;
            stats.peak_concurrent = stats.peak_concurrent.max(stats.running);
            RunningGuard {
                stats: self.stats.clone(),
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.stats.lock().total_cancelled += 1;
                Err(PoolError::Cancelled(label.to_string()))
            }
            out = task => {
                self.stats.lock().total_completed += 1;
                Ok(out)
            }
        };
        drop(permit);
        debug!(%label, ok = result.is_ok(), "WorkerPool::run: finished");
        result
    }
}
