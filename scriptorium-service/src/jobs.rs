//! Background job queue.
//!
//! Thin ownership layer over spawned tasks so that job lifecycle is
//! observable without passing raw task handles around. Cancellation of
//! embedding work is cooperative through the persisted job status; the
//! queue only tracks whether a task is still running.

use dashmap::DashMap;
use std::future::Future;
use tokio::task::JoinHandle;

/// Handle returned to submitters, identifying the job by key
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub key: String,
}

/// Tracks spawned background tasks by key
pub struct JobQueue {
    tasks: DashMap<String, JoinHandle<()>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Spawn a job under the given key and track its handle.
    ///
    /// A finished task under the same key is replaced; submitting over a
    /// still-running key also replaces the tracked handle (the old task
    /// keeps running to completion, which matches the fire-and-forget
    /// semantics of the pipelines submitted here).
    pub fn submit<F>(&self, key: impl Into<String>, future: F) -> JobHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let handle = tokio::spawn(future);
        self.tasks.insert(key.clone(), handle);
        self.reap_finished();
        JobHandle { key }
    }

    /// Whether the task submitted under `key` is still running
    pub fn is_running(&self, key: &str) -> bool {
        self.tasks
            .get(key)
            .map(|entry| !entry.value().is_finished())
            .unwrap_or(false)
    }

    /// Drop handles of tasks that have completed
    fn reap_finished(&self) {
        self.tasks.retain(|_, handle| !handle.is_finished());
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_submit_runs_job() {
        let queue = JobQueue::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = ran.clone();
        queue.submit("test-job", async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ran.load(Ordering::SeqCst));
        assert!(!queue.is_running("test-job"));
    }

    #[tokio::test]
    async fn test_is_running_while_job_active() {
        let queue = JobQueue::new();

        let handle = queue.submit("slow-job", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        assert!(queue.is_running(&handle.key));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!queue.is_running(&handle.key));
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_running() {
        let queue = JobQueue::new();
        assert!(!queue.is_running("never-submitted"));
    }
}
