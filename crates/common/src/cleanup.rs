//! Deferred resource cleanup
//!
//! The upload pipeline acquires temporary resources as it goes: payload
//! spill files, archive files, remote storage sessions. Each acquisition
//! registers a release action with a [`CleanupGuard`]; the pipeline drains
//! the guard exactly once at teardown, whether it succeeded or failed.
//!
//! Release actions run in reverse-registration order, in two passes: local
//! tasks (temp files, handles) first, then remote teardown (service
//! sessions), so local disk state is reclaimed even if remote teardown
//! fails. A failing task is logged at warn level and never masks the
//! pipeline's own result or stops later tasks from running.

use futures::future::BoxFuture;
use std::future::Future;

type CleanupFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), anyhow::Error>> + Send>;

struct CleanupTask {
    label: String,
    run: CleanupFn,
}

/// Collects release actions and drains them at scope exit
///
/// ```ignore
/// let mut guard = CleanupGuard::new();
/// guard.register("payload temp file", move || async move {
///     tokio::fs::remove_file(&path).await?;
///     Ok(())
/// });
/// let result = run_pipeline(&mut guard).await;
/// guard.run_all().await;
/// result
/// ```
#[derive(Default)]
pub struct CleanupGuard {
    local: Vec<CleanupTask>,
    remote: Vec<CleanupTask>,
}

impl CleanupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local release action (temp files, handles).
    ///
    /// Call at the moment the resource is acquired, not later; a pipeline
    /// failure between acquisition and registration would leak the resource.
    pub fn register<F, Fut>(&mut self, label: impl Into<String>, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.local.push(CleanupTask {
            label: label.into(),
            run: Box::new(move || Box::pin(f())),
        });
    }

    /// Register a remote teardown action (service sessions, connections).
    ///
    /// Remote tasks run after all local tasks, in reverse-registration order.
    pub fn register_remote<F, Fut>(&mut self, label: impl Into<String>, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
    {
        self.remote.push(CleanupTask {
            label: label.into(),
            run: Box::new(move || Box::pin(f())),
        });
    }

    /// Number of registered tasks still pending
    pub fn pending(&self) -> usize {
        self.local.len() + self.remote.len()
    }

    /// Drain every registered task, local pass then remote pass, each in
    /// reverse-registration order. Task failures are downgraded to warnings.
    pub async fn run_all(&mut self) {
        while let Some(task) = self.local.pop() {
            Self::run_task(task).await;
        }
        while let Some(task) = self.remote.pop() {
            Self::run_task(task).await;
        }
    }

    async fn run_task(task: CleanupTask) {
        tracing::debug!(label = %task.label, "running cleanup task");
        if let Err(e) = (task.run)().await {
            tracing::warn!(label = %task.label, "cleanup task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, CleanupGuard) {
        (Arc::new(Mutex::new(Vec::new())), CleanupGuard::new())
    }

    #[tokio::test]
    async fn test_runs_in_reverse_order() {
        let (order, mut guard) = recorder();

        for label in ["first", "second", "third"] {
            let order = order.clone();
            guard.register(label, move || async move {
                order.lock().push(label);
                Ok(())
            });
        }

        guard.run_all().await;
        assert_eq!(*order.lock(), vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_local_pass_runs_before_remote() {
        let (order, mut guard) = recorder();

        let o = order.clone();
        guard.register_remote("session", move || async move {
            o.lock().push("remote");
            Ok(())
        });
        let o = order.clone();
        guard.register("temp file", move || async move {
            o.lock().push("local");
            Ok(())
        });

        guard.run_all().await;
        assert_eq!(*order.lock(), vec!["local", "remote"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_tasks() {
        let (order, mut guard) = recorder();

        let o = order.clone();
        guard.register("survives", move || async move {
            o.lock().push("survives");
            Ok(())
        });
        guard.register("fails", move || async move {
            Err(anyhow::anyhow!("release failed"))
        });

        guard.run_all().await;
        assert_eq!(*order.lock(), vec!["survives"]);
        assert_eq!(guard.pending(), 0);
    }

    #[tokio::test]
    async fn test_tasks_run_exactly_once() {
        let (order, mut guard) = recorder();

        let o = order.clone();
        guard.register("once", move || async move {
            o.lock().push("once");
            Ok(())
        });

        guard.run_all().await;
        guard.run_all().await;
        assert_eq!(*order.lock(), vec!["once"]);
    }
}
