//! Task queue storage.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::types::{DeadLetterEntry, Task, TaskId, TaskStatus};

pub trait TaskStore: Send + Sync {
    fn enqueue(&self, task: Task) -> Result<TaskId, TaskStoreError>;

    /// Enqueue unless a waiting task with the same dedupe key exists.
    /// Returns `None` when the task was coalesced into the existing one.
    fn enqueue_unique(&self, task: Task) -> Result<Option<TaskId>, TaskStoreError>;

    fn get(&self, id: TaskId) -> Result<Option<Task>, TaskStoreError>;

    fn update(&self, task: &Task) -> Result<(), TaskStoreError>;

    /// Oldest ready waiting task, marked running.
    fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Task>, TaskStoreError>;

    /// Move a task out of the queue into the dead-letter list.
    fn dead_letter(&self, task: Task, reason: String, now: DateTime<Utc>) -> Result<(), TaskStoreError>;

    /// Oldest first.
    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, TaskStoreError>;

    /// Drop completed tasks last updated at or before `before`. Returns how
    /// many were removed.
    fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, TaskStoreError>;

    fn stats(&self) -> Result<TaskStats, TaskStoreError>;
}

impl<S> TaskStore for std::sync::Arc<S>
where
    S: TaskStore + ?Sized,
{
    fn enqueue(&self, task: Task) -> Result<TaskId, TaskStoreError> {
        (**self).enqueue(task)
    }

    fn enqueue_unique(&self, task: Task) -> Result<Option<TaskId>, TaskStoreError> {
        (**self).enqueue_unique(task)
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>, TaskStoreError> {
        (**self).get(id)
    }

    fn update(&self, task: &Task) -> Result<(), TaskStoreError> {
        (**self).update(task)
    }

    fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Task>, TaskStoreError> {
        (**self).claim_next(now)
    }

    fn dead_letter(&self, task: Task, reason: String, now: DateTime<Utc>) -> Result<(), TaskStoreError> {
        (**self).dead_letter(task, reason, now)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, TaskStoreError> {
        (**self).list_dead_letters(limit)
    }

    fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, TaskStoreError> {
        (**self).purge_completed(before)
    }

    fn stats(&self) -> Result<TaskStats, TaskStoreError> {
        (**self).stats()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskStoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("task already exists: {0}")]
    AlreadyExists(TaskId),

    #[error("task store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub retrying: usize,
    pub dead_lettered: usize,
}

#[derive(Debug, Default)]
struct TaskTable {
    tasks: HashMap<TaskId, Task>,
    dead_letters: Vec<DeadLetterEntry>,
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    inner: RwLock<TaskTable>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn enqueue(&self, task: Task) -> Result<TaskId, TaskStoreError> {
        let mut table = self.inner.write().map_err(|_| TaskStoreError::Poisoned)?;
        if table.tasks.contains_key(&task.id) {
            return Err(TaskStoreError::AlreadyExists(task.id));
        }
        let id = task.id;
        table.tasks.insert(id, task);
        Ok(id)
    }

    fn enqueue_unique(&self, task: Task) -> Result<Option<TaskId>, TaskStoreError> {
        let mut table = self.inner.write().map_err(|_| TaskStoreError::Poisoned)?;
        let key = task.kind.dedupe_key();
        let duplicate = table
            .tasks
            .values()
            .any(|t| t.status.is_waiting() && t.kind.dedupe_key() == key);
        if duplicate {
            return Ok(None);
        }
        let id = task.id;
        table.tasks.insert(id, task);
        Ok(Some(id))
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>, TaskStoreError> {
        let table = self.inner.read().map_err(|_| TaskStoreError::Poisoned)?;
        Ok(table.tasks.get(&id).cloned())
    }

    fn update(&self, task: &Task) -> Result<(), TaskStoreError> {
        let mut table = self.inner.write().map_err(|_| TaskStoreError::Poisoned)?;
        match table.tasks.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(())
            }
            None => Err(TaskStoreError::NotFound(task.id)),
        }
    }

    fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Task>, TaskStoreError> {
        let mut table = self.inner.write().map_err(|_| TaskStoreError::Poisoned)?;
        let next = table
            .tasks
            .values()
            .filter(|t| t.status.is_waiting() && t.is_ready(now))
            .min_by_key(|t| (t.run_at.unwrap_or(t.created_at), t.id))
            .map(|t| t.id);

        Ok(next.and_then(|id| {
            table.tasks.get_mut(&id).map(|task| {
                task.mark_running(now);
                task.clone()
            })
        }))
    }

    fn dead_letter(&self, mut task: Task, reason: String, now: DateTime<Utc>) -> Result<(), TaskStoreError> {
        let mut table = self.inner.write().map_err(|_| TaskStoreError::Poisoned)?;
        table.tasks.remove(&task.id);
        task.status = TaskStatus::DeadLettered {
            error: reason.clone(),
            attempts: task.attempt,
        };
        task.updated_at = now;
        table.dead_letters.push(DeadLetterEntry {
            task,
            dead_lettered_at: now,
            reason,
        });
        Ok(())
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, TaskStoreError> {
        let table = self.inner.read().map_err(|_| TaskStoreError::Poisoned)?;
        Ok(table.dead_letters.iter().take(limit).cloned().collect())
    }

    fn purge_completed(&self, before: DateTime<Utc>) -> Result<usize, TaskStoreError> {
        let mut table = self.inner.write().map_err(|_| TaskStoreError::Poisoned)?;
        let len = table.tasks.len();
        table
            .tasks
            .retain(|_, t| !(t.status == TaskStatus::Completed && t.updated_at <= before));
        Ok(len - table.tasks.len())
    }

    fn stats(&self) -> Result<TaskStats, TaskStoreError> {
        let table = self.inner.read().map_err(|_| TaskStoreError::Poisoned)?;
        let mut stats = TaskStats {
            dead_lettered: table.dead_letters.len(),
            ..TaskStats::default()
        };
        for task in table.tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed { .. } => stats.retrying += 1,
                TaskStatus::DeadLettered { .. } => stats.dead_lettered += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::types::TaskKind;
    use chrono::Duration;
    use jobmesh_core::JobId;

    #[test]
    fn unique_enqueue_coalesces_waiting_checks() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();
        let job = JobId::new();

        assert!(store.enqueue_unique(Task::new(TaskKind::trending_check(job), now)).unwrap().is_some());
        assert!(store.enqueue_unique(Task::new(TaskKind::trending_check(job), now)).unwrap().is_none());
        assert!(
            store
                .enqueue_unique(Task::new(TaskKind::trending_check(JobId::new()), now))
                .unwrap()
                .is_some()
        );
        assert_eq!(store.stats().unwrap().pending, 2);
    }

    #[test]
    fn running_task_does_not_block_a_new_check() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();
        let job = JobId::new();

        store.enqueue_unique(Task::new(TaskKind::trending_check(job), now)).unwrap();
        store.claim_next(now).unwrap().unwrap();
        assert!(store.enqueue_unique(Task::new(TaskKind::trending_check(job), now)).unwrap().is_some());
    }

    #[test]
    fn claim_respects_run_at() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();
        let task = Task::new(TaskKind::trending_check(JobId::new()), now).run_at(now + Duration::seconds(2));
        store.enqueue(task).unwrap();

        assert!(store.claim_next(now).unwrap().is_none());
        let claimed = store.claim_next(now + Duration::seconds(2)).unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::Running);
        assert_eq!(claimed.attempt, 1);
    }

    #[test]
    fn dead_letter_removes_from_queue() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();
        let task = Task::new(TaskKind::trending_check(JobId::new()), now);
        let id = store.enqueue(task.clone()).unwrap();

        store.dead_letter(task, "gave up".into(), now).unwrap();
        assert!(store.get(id).unwrap().is_none());
        let dl = store.list_dead_letters(10).unwrap();
        assert_eq!(dl.len(), 1);
        assert_eq!(dl[0].reason, "gave up");
    }

    #[test]
    fn purge_drops_only_old_completed_tasks() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();

        let mut done = Task::new(TaskKind::trending_check(JobId::new()), now);
        done.mark_completed(now, now);
        let done_id = store.enqueue(done).unwrap();

        let mut fresh = Task::new(TaskKind::trending_check(JobId::new()), now);
        fresh.mark_completed(now, now + Duration::minutes(10));
        let fresh_id = store.enqueue(fresh).unwrap();

        let waiting_id = store
            .enqueue(Task::new(TaskKind::trending_check(JobId::new()), now))
            .unwrap();

        assert_eq!(store.purge_completed(now + Duration::minutes(5)).unwrap(), 1);
        assert!(store.get(done_id).unwrap().is_none());
        assert!(store.get(fresh_id).unwrap().is_some());
        assert!(store.get(waiting_id).unwrap().is_some());
        assert_eq!(store.stats().unwrap().pending, 1);
    }
}
