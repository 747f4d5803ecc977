use std::fmt;
use std::future::Future;
use std::num::NonZero;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::error::Result;

/// Upper bound on repository operations running at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConcurrencyLimit {
    /// No limit beyond what the runtime imposes
    #[default]
    Unbounded,
    Max(NonZero<usize>),
}

impl From<Option<usize>> for ConcurrencyLimit {
    fn from(value: Option<usize>) -> Self {
        value
            .and_then(NonZero::new)
            .map(ConcurrencyLimit::Max)
            .unwrap_or(ConcurrencyLimit::Unbounded)
    }
}

/// One repository operation
pub struct RepositoryTask {
    label: String,
    future: BoxFuture<'static, Result<()>>,
}

impl RepositoryTask {
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: Box::pin(future),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run the task, turning a failure into a logged no-op
    async fn run_safe(self) -> bool {
        match self.future.await {
            Ok(()) => true,
            Err(e) if e.is_recoverable() => {
                warn!("Task '{}' failed: {}", self.label, e);
                false
            }
            Err(e) => {
                error!("Task '{}' failed: {}", self.label, e);
                false
            }
        }
    }
}

impl fmt::Debug for RepositoryTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryTask")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Tasks queued for one [`TaskRunner::submit`] call
#[derive(Debug, Default)]
pub struct TaskBatch {
    tasks: Vec<RepositoryTask>,
}

impl TaskBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: RepositoryTask) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl FromIterator<RepositoryTask> for TaskBatch {
    fn from_iter<I: IntoIterator<Item = RepositoryTask>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

/// Aggregate result of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.total - self.failed
    }
}

/// Executes batches of independent repository operations concurrently.
///
/// A failing or panicking task is logged and counted; it never cancels or
/// blocks its siblings, and `submit` always returns once every task has
/// finished.
#[derive(Debug, Clone, Default)]
pub struct TaskRunner {
    permits: Option<Arc<Semaphore>>,
}

impl TaskRunner {
    pub fn new(limit: ConcurrencyLimit) -> Self {
        let permits = match limit {
            ConcurrencyLimit::Unbounded => None,
            ConcurrencyLimit::Max(max) => Some(Arc::new(Semaphore::new(max.get()))),
        };
        Self { permits }
    }

    pub async fn submit(&self, batch: TaskBatch) -> BatchSummary {
        let total = batch.len();
        if total == 0 {
            return BatchSummary::default();
        }
        debug!("Executing {} repository tasks", total);

        let mut running = JoinSet::new();
        for task in batch.tasks {
            let permits = self.permits.clone();
            running.spawn(async move {
                let _permit = match permits {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                task.run_safe().await
            });
        }

        let mut summary = BatchSummary { total, failed: 0 };
        while let Some(joined) = running.join_next().await {
            match joined {
                Ok(true) => {}
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    error!("Repository task aborted: {}", e);
                    summary.failed += 1;
                }
            }
        }

        debug!(
            "Repository tasks done: {} succeeded, {} failed",
            summary.succeeded(),
            summary.failed
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_batch() {
        let runner = TaskRunner::default();
        assert_eq!(runner.submit(TaskBatch::new()).await, BatchSummary::default());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let completed = Arc::new(AtomicUsize::new(0));
        let runner = TaskRunner::default();

        let batch: TaskBatch = (0..5)
            .map(|k| {
                let completed = Arc::clone(&completed);
                RepositoryTask::new(format!("task-{}", k), async move {
                    if k == 2 {
                        return Err(SyncError::operation_failed("alice/theme-x", "boom"));
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        let summary = runner.submit(batch).await;
        assert_eq!(summary, BatchSummary { total: 5, failed: 1 });
        assert_eq!(completed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let completed = Arc::new(AtomicUsize::new(0));
        let runner = TaskRunner::default();

        let mut batch = TaskBatch::new();
        batch.push(RepositoryTask::new("panics", async {
            let missing: Option<()> = None;
            missing.expect("task exploded");
            Ok(())
        }));
        let counter = Arc::clone(&completed);
        batch.push(RepositoryTask::new("works", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let summary = runner.submit(batch).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runner = TaskRunner::new(ConcurrencyLimit::from(Some(2)));

        let batch: TaskBatch = (0..8)
            .map(|k| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                RepositoryTask::new(format!("task-{}", k), async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        let summary = runner.submit(batch).await;
        assert_eq!(summary.succeeded(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_limit_from_option() {
        assert_eq!(ConcurrencyLimit::from(None), ConcurrencyLimit::Unbounded);
        assert_eq!(ConcurrencyLimit::from(Some(0)), ConcurrencyLimit::Unbounded);
        assert!(matches!(ConcurrencyLimit::from(Some(3)), ConcurrencyLimit::Max(n) if n.get() == 3));
    }
}
