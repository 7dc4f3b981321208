//! Polls the task store and runs tasks with retry and dead-lettering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::store::{TaskStore, TaskStoreError};
use super::types::{Task, TaskResult, TaskStatus};

pub type TaskHandler = Box<dyn Fn(&Task) -> TaskResult + Send + Sync>;

#[derive(Debug, Clone)]
pub struct TaskExecutorConfig {
    pub name: String,
    pub poll_interval: Duration,
    /// How long completed tasks stay in the store before an idle tick drops them.
    pub completed_retention: Duration,
}

impl Default for TaskExecutorConfig {
    fn default() -> Self {
        Self {
            name: "task-executor".to_string(),
            poll_interval: Duration::from_millis(100),
            completed_retention: Duration::from_secs(600),
        }
    }
}

impl TaskExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_completed_retention(mut self, retention: Duration) -> Self {
        self.completed_retention = retention;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub dead_lettered: u64,
}

impl ExecutorStats {
    fn record(&mut self, status: &TaskStatus) {
        self.processed += 1;
        match status {
            TaskStatus::Completed => self.succeeded += 1,
            TaskStatus::DeadLettered { .. } => {
                self.failed += 1;
                self.dead_lettered += 1;
            }
            _ => self.failed += 1,
        }
    }
}

#[derive(Debug)]
pub struct TaskExecutorHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl TaskExecutorHandle {
    /// Stop polling and wait for the in-flight task to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

pub struct TaskExecutor<S> {
    store: S,
    handlers: HashMap<&'static str, TaskHandler>,
}

impl<S: TaskStore> TaskExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for tasks whose kind has `type_name`.
    pub fn register<F>(&mut self, type_name: &'static str, handler: F)
    where
        F: Fn(&Task) -> TaskResult + Send + Sync + 'static,
    {
        self.handlers.insert(type_name, Box::new(handler));
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Claim and run one ready task. Returns the task's resulting status.
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<Option<TaskStatus>, TaskStoreError> {
        let Some(mut task) = self.store.claim_next(now)? else {
            return Ok(None);
        };
        debug!(task_id = %task.id, kind = task.kind.type_name(), attempt = task.attempt, "task claimed");

        let result = match self.handlers.get(task.kind.type_name()) {
            Some(handler) => handler(&task),
            None => TaskResult::Failure(format!("no handler for {}", task.kind.type_name())),
        };
        let finished = Utc::now().max(now);

        match result {
            TaskResult::Success => task.mark_completed(now, finished),
            TaskResult::Failure(reason) => task.mark_failed(reason, now, finished, None),
            TaskResult::RetryAfter(delay) => {
                task.mark_failed("retry requested".to_string(), now, finished, Some(delay))
            }
        }

        if let TaskStatus::DeadLettered { error, attempts } = &task.status {
            error!(task_id = %task.id, kind = task.kind.type_name(), attempts, error = %error, "task dead-lettered");
            let reason = error.clone();
            let status = task.status.clone();
            self.store.dead_letter(task, reason, finished)?;
            return Ok(Some(status));
        }

        if let TaskStatus::Failed { error, attempt } = &task.status {
            warn!(task_id = %task.id, kind = task.kind.type_name(), attempt, error = %error, "task failed, will retry");
        }
        self.store.update(&task)?;
        Ok(Some(task.status))
    }

    /// Drop tasks that completed more than `retention` before `now`.
    pub fn purge_completed(&self, now: DateTime<Utc>, retention: Duration) -> Result<usize, TaskStoreError> {
        let cutoff = chrono::Duration::from_std(retention)
            .ok()
            .and_then(|r| now.checked_sub_signed(r));
        match cutoff {
            Some(cutoff) => self.store.purge_completed(cutoff),
            None => Ok(0),
        }
    }

    /// Run every task that is ready at `now`. Returns how many ran.
    pub fn run_pending(&self, now: DateTime<Utc>) -> Result<usize, TaskStoreError> {
        let mut ran = 0;
        while self.run_once(now)?.is_some() {
            ran += 1;
        }
        Ok(ran)
    }
}

impl<S: TaskStore + 'static> TaskExecutor<S> {
    pub fn spawn(self, config: TaskExecutorConfig) -> std::io::Result<TaskExecutorHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));
        let loop_stats = stats.clone();

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || executor_loop(self, config, shutdown_rx, loop_stats))?;

        Ok(TaskExecutorHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn executor_loop<S: TaskStore>(
    executor: TaskExecutor<S>,
    config: TaskExecutorConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<ExecutorStats>>,
) {
    info!(executor = %config.name, "task executor started");

    loop {
        match executor.run_once(Utc::now()) {
            Ok(Some(status)) => {
                if let Ok(mut s) = stats.lock() {
                    s.record(&status);
                }
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                continue;
            }
            Ok(None) => match executor.purge_completed(Utc::now(), config.completed_retention) {
                Ok(0) => {}
                Ok(purged) => debug!(executor = %config.name, purged, "completed tasks purged"),
                Err(e) => warn!(executor = %config.name, error = %e, "failed to purge completed tasks"),
            },
            Err(e) => error!(executor = %config.name, error = %e, "failed to claim task"),
        }

        match shutdown_rx.recv_timeout(config.poll_interval) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }

    info!(executor = %config.name, "task executor stopped");
}
