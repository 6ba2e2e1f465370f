//! Bounded pool for CPU-bound tool work.

use crate::error::{MediaError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

/// Runs blocking jobs on tokio's blocking threads, at most `size` at a time.
#[derive(Debug, Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
}

impl BlockingPool {
    pub fn new(size: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    /// Number of jobs that could start right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` off the async runtime and await its result.
    pub async fn run<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| MediaError::ToolFailed(format!("Worker pool closed: {}", e)))?;

        debug!("Worker permit acquired ({} left)", self.permits.available_permits());

        // The permit moves into the job so it is released when the work ends,
        // even if the awaiting request has already given up.
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| MediaError::ToolFailed(format!("Worker task failed: {}", e)))?
    }
}
