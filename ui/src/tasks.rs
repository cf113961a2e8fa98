//! Registry of the session's background tasks. Every task gets a
//! cancellation token derived from the registry's root token.

use std::{future::Future, sync::Mutex};

use api::compat::{self, MaybeSend};
use dioxus_logger::tracing::{debug, warn};
use tokio_util::sync::CancellationToken;

/// How long a task is meant to live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskLifetime {
    /// Runs until cancelled by name, or until it cancels itself.
    UntilCancelled,
    /// Runs for the whole session. Only [`TaskRegistry::shutdown`] stops it.
    Session,
}

#[derive(Debug)]
struct ManagedTask {
    name: &'static str,
    lifetime: TaskLifetime,
    token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    root: CancellationToken,
    tasks: Mutex<Vec<ManagedTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task`, handing it the token it must watch.
    pub fn spawn<F, Fut>(
        &self,
        name: &'static str,
        lifetime: TaskLifetime,
        task: F,
    ) -> CancellationToken
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + MaybeSend + 'static,
    {
        let token = self.root.child_token();
        self.with_tasks(|tasks| {
            tasks.push(ManagedTask {
                name,
                lifetime,
                token: token.clone(),
            })
        });
        debug!("spawning task {name} ({lifetime:?})");
        compat::spawn(task(token.clone()));
        token
    }

    /// Cancels the named task. Session-lifetime tasks refuse.
    pub fn cancel(&self, name: &str) -> bool {
        self.with_tasks(|tasks| {
            let mut cancelled = false;
            for task in tasks.iter().filter(|t| t.name == name) {
                match task.lifetime {
                    TaskLifetime::UntilCancelled => {
                        task.token.cancel();
                        cancelled = true;
                    }
                    TaskLifetime::Session => {
                        warn!("refusing to cancel session task {name}")
                    }
                }
            }
            cancelled
        })
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.with_tasks(|tasks| {
            tasks
                .iter()
                .any(|t| t.name == name && !t.token.is_cancelled())
        })
    }

    /// Ends the session: cancels every task.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    fn with_tasks<R>(&self, f: impl FnOnce(&mut Vec<ManagedTask>) -> R) -> R {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn session_tasks_survive_cancel_by_name() {
        let registry = TaskRegistry::new();
        registry.spawn("phase", TaskLifetime::UntilCancelled, |token| async move {
            token.cancelled().await
        });
        registry.spawn("supply", TaskLifetime::Session, |token| async move {
            token.cancelled().await
        });

        assert!(registry.cancel("phase"));
        assert!(!registry.cancel("supply"));
        assert!(!registry.is_running("phase"));
        assert!(registry.is_running("supply"));

        registry.shutdown();
        assert!(!registry.is_running("supply"));
    }
}
