use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

pub type BackgroundTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs work detached from the request that scheduled it.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, task: BackgroundTask);
}

/// Spawns onto the ambient tokio runtime. A panicking task ends only itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSpawner;

impl TaskSpawner for TokioSpawner {
    fn spawn(&self, task: BackgroundTask) {
        tokio::spawn(task);
    }
}

/// Queues tasks until `run_all` is awaited, so callers can assert on what
/// happens before and after background work.
#[derive(Default)]
pub struct DeferredSpawner {
    queue: Mutex<Vec<BackgroundTask>>,
}

impl DeferredSpawner {
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drains the queue, including tasks scheduled by tasks. Returns how many ran.
    pub async fn run_all(&self) -> usize {
        let mut completed = 0;
        loop {
            let batch =
                std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner));
            if batch.is_empty() {
                return completed;
            }
            for task in batch {
                task.await;
                completed += 1;
            }
        }
    }
}

impl TaskSpawner for DeferredSpawner {
    fn spawn(&self, task: BackgroundTask) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push(task);
    }
}
