//! Ownership of readiness tasks
//!
//! One background task per subscribed AppContext id. Every task gets a child
//! of the supervisor's root token, so a single cancel on shutdown reaches all
//! of them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct ReadinessTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry of running readiness tasks
pub struct ReadinessSupervisor {
    root: CancellationToken,
    tasks: Mutex<HashMap<String, ReadinessTask>>,
}

impl Default for ReadinessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReadinessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessSupervisor")
            .field("tasks", &self.tasks().len())
            .finish_non_exhaustive()
    }
}

impl ReadinessSupervisor {
    /// Create a new empty supervisor
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<String, ReadinessTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the readiness task of `app_context_id`, cancelling any task
    /// already running for it
    pub fn spawn<F, Fut>(&self, app_context_id: &str, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.root.child_token();
        let handle = tokio::spawn(task(token.clone()));

        let mut tasks = self.tasks();
        tasks.retain(|_, t| !t.handle.is_finished());
        if let Some(previous) = tasks.insert(app_context_id.to_string(), ReadinessTask { token, handle }) {
            debug!(app_context = app_context_id, "replacing readiness task");
            previous.token.cancel();
        }
    }

    /// Cancel the task of `app_context_id`. Returns whether one was still
    /// running; a finished task is only deregistered.
    pub fn cancel(&self, app_context_id: &str) -> bool {
        match self.tasks().remove(app_context_id) {
            Some(task) if !task.handle.is_finished() => {
                debug!(app_context = app_context_id, "cancelling readiness task");
                task.token.cancel();
                true
            }
            Some(_) => {
                debug!(app_context = app_context_id, "readiness task already finished");
                false
            }
            None => false,
        }
    }

    /// Whether a task for `app_context_id` is still running
    pub fn is_running(&self, app_context_id: &str) -> bool {
        self.tasks()
            .get(app_context_id)
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Number of tasks still running
    pub fn running(&self) -> usize {
        self.tasks().values().filter(|t| !t.handle.is_finished()).count()
    }

    /// Cancel every task and wait for all of them to finish
    pub async fn shutdown(&self) {
        self.root.cancel();
        let tasks: Vec<(String, ReadinessTask)> = self.tasks().drain().collect();
        for (id, task) in tasks {
            if let Err(e) = task.handle.await {
                debug!(app_context = %id, error = %e, "readiness task ended abnormally");
            }
        }
    }
}
