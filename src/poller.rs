use crate::backend::TaskSource;
use crate::config::AppConfig;
use crate::error::{AppError, EngineError};
use meilisearch_sdk::tasks::Task;
use std::time::Duration;

/// Waits for an enqueued task to reach a terminal state.
///
/// The status is read every `interval`, doubling after each non-terminal read
/// up to `max_interval`. The whole wait is bounded by `timeout`; dropping the
/// returned future stops polling.
#[derive(Debug, Clone, Copy)]
pub struct TaskPoller {
    interval: Duration,
    max_interval: Duration,
    timeout: Duration,
}

impl TaskPoller {
    pub fn new(interval: Duration, max_interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            max_interval: max_interval.max(interval),
            timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.poll_interval(),
            config.poll_max_interval(),
            config.poll_timeout(),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the terminal task when it succeeded, `TaskFailed` when it ended
    /// any other way, and `PollTimeout` once the budget is spent.
    pub async fn wait_for_task<S>(&self, source: &S, task_uid: u32) -> Result<Task, AppError>
    where
        S: TaskSource + ?Sized,
    {
        log::debug!(
            "Waiting up to {}ms for task {}.",
            self.timeout.as_millis(),
            task_uid
        );
        match tokio::time::timeout(self.timeout, self.poll_until_terminal(source, task_uid)).await
        {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Task {} still pending after {}ms.",
                    task_uid,
                    self.timeout.as_millis()
                );
                Err(AppError::PollTimeout {
                    task_uid,
                    waited: self.timeout,
                })
            }
        }
    }

    async fn poll_until_terminal<S>(&self, source: &S, task_uid: u32) -> Result<Task, AppError>
    where
        S: TaskSource + ?Sized,
    {
        let mut interval = self.interval;
        loop {
            match source.get_task(task_uid).await {
                Ok(Task::Enqueued { .. }) => log::trace!("Task {} is enqueued.", task_uid),
                Ok(Task::Processing { .. }) => log::trace!("Task {} is processing.", task_uid),
                Ok(task) => return finish(task, task_uid),
                // only the status read is retried, never the mutation itself
                Err(e) if e.is_transient() => {
                    log::debug!("Reading task {} failed, retrying: {}", task_uid, e)
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(self.max_interval);
        }
    }
}

fn finish(task: Task, task_uid: u32) -> Result<Task, AppError> {
    match task {
        Task::Succeeded { .. } => {
            log::debug!("Task {} succeeded.", task_uid);
            Ok(task)
        }
        Task::Failed { content } => {
            log::warn!(
                "Task {} failed: {}",
                task_uid,
                content.error.error_message
            );
            Err(AppError::TaskFailed {
                task_uid,
                error: Some(EngineError::from(&content.error)),
            })
        }
        // canceled, or a status this client does not know about
        #[allow(unreachable_patterns)]
        _ => {
            log::warn!("Task {} ended without succeeding.", task_uid);
            Err(AppError::TaskFailed {
                task_uid,
                error: None,
            })
        }
    }
}
