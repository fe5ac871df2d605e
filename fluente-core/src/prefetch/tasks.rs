//! Tracking for fire-and-forget background tasks

use std::future::Future;

use parking_lot::Mutex;
use tokio::task::JoinSet;

/// Set of background tasks that callers never await individually
///
/// Results are discarded. [`quiesce`](Self::quiesce) waits until every task,
/// including tasks spawned while waiting, has finished.
#[derive(Default)]
pub struct TaskTracker {
    tasks: Mutex<JoinSet<()>>,
}

impl TaskTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task on the current runtime
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        // Reap finished tasks so the set does not grow without bound
        while let Some(finished) = tasks.try_join_next() {
            log_join_failure(finished);
        }
        tasks.spawn(task);
    }

    /// Number of tasks not yet reaped
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no task is tracked
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Wait for all tracked tasks to finish
    ///
    /// Dropping this future aborts the tasks it had taken over.
    pub async fn quiesce(&self) {
        loop {
            let mut batch = std::mem::take(&mut *self.tasks.lock());
            if batch.is_empty() {
                return;
            }
            while let Some(finished) = batch.join_next().await {
                log_join_failure(finished);
            }
        }
    }
}

fn log_join_failure(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Background task panicked");
        }
    }
}

impl std::fmt::Debug for TaskTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTracker")
            .field("tasks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_quiesce_waits_for_nested_tasks() {
        let tracker = Arc::new(TaskTracker::new());
        let done = Arc::new(AtomicUsize::new(0));

        let inner_tracker = Arc::clone(&tracker);
        let inner_done = Arc::clone(&done);
        tracker.spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let nested_done = Arc::clone(&inner_done);
            inner_tracker.spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                nested_done.fetch_add(1, Ordering::SeqCst);
            });
            inner_done.fetch_add(1, Ordering::SeqCst);
        });

        tracker.quiesce().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn test_quiesce_on_empty_tracker_returns() {
        let tracker = TaskTracker::new();
        tracker.quiesce().await;
    }
}
