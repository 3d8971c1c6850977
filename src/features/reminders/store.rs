//! Task store collaborator consumed by the reminder engine.

use crate::core::{Task, TaskId};
use anyhow::Result;
use async_trait::async_trait;

/// Read access to task records (plus the one write a shown reminder needs)
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Current state of a task, `None` once deleted
    async fn get_by_id(&self, task_id: TaskId) -> Result<Option<Task>>;

    /// All tasks not yet completed, ordered by due time
    async fn list_pending(&self) -> Result<Vec<Task>>;

    async fn mark_completed(&self, task_id: TaskId) -> Result<()>;
}
