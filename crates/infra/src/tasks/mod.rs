//! Background task queue with retry, backoff and dead-lettering.
//!
//! Delayed side effects (the debounced trending check after an application)
//! are enqueued here instead of being fired from the request path:
//!
//! - [`Task`]: kind, schedule, attempt history
//! - [`TaskStore`]: queue persistence, including dedupe-on-enqueue
//! - [`TaskExecutor`]: claims ready tasks and applies the [`RetryPolicy`]

pub mod executor;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, TaskExecutor, TaskExecutorConfig, TaskExecutorHandle};
pub use store::{InMemoryTaskStore, TaskStats, TaskStore, TaskStoreError};
pub use types::{
    BackoffStrategy, DeadLetterEntry, RetryPolicy, Task, TaskId, TaskKind, TaskResult, TaskStatus,
};
