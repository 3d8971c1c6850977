//! # Feature: Task Lifecycle Coordinator
//!
//! Translates task store events into scheduler calls and notification
//! dismissals.
//!
//! | Event             | Reminder action           |
//! |-------------------|---------------------------|
//! | created           | schedule                  |
//! | edited            | reschedule                |
//! | completed         | cancel + dismiss          |
//! | reactivated       | schedule                  |
//! | deleted           | cancel + dismiss          |
//! | completed purged  | cancel all + dismiss each |
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Mark-completed action from a shown reminder
//! - 1.1.0: Content-only edits skip rescheduling
//! - 1.0.0: Initial release

use crate::core::{Task, TaskId};
use crate::features::reminders::error::{ReminderError, SchedulingError};
use crate::features::reminders::notifier::Notifier;
use crate::features::reminders::scheduler::ReminderScheduler;
use crate::features::reminders::store::TaskStore;
use log::{debug, info, warn};
use std::sync::Arc;

/// A change to a task record, as reported by the store owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Created(Task),
    Edited { before: Task, after: Task },
    Completed(TaskId),
    /// Completed task moved back to pending
    Reactivated(Task),
    Deleted(TaskId),
    /// Bulk deletion of completed tasks
    CompletedPurged(Vec<TaskId>),
}

pub struct TaskLifecycleCoordinator {
    scheduler: Arc<ReminderScheduler>,
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
}

impl TaskLifecycleCoordinator {
    pub fn new(
        scheduler: Arc<ReminderScheduler>,
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        TaskLifecycleCoordinator {
            scheduler,
            store,
            notifier,
        }
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    /// Check timer capability once, then re-arm every pending task.
    ///
    /// Returns the number of reminders armed.
    pub async fn startup(&self) -> Result<usize, ReminderError> {
        if let Err(e) = self.scheduler.check_exact_timers() {
            warn!("Exact timers unavailable, reminders will not fire: {}", e);
            return Err(e.into());
        }
        self.scheduler.rearm_pending().await
    }

    pub async fn handle(&self, event: TaskEvent) -> Result<(), SchedulingError> {
        match event {
            TaskEvent::Created(task) => self.on_created(&task).await,
            TaskEvent::Edited { before, after } => self.on_edited(&before, &after).await,
            TaskEvent::Completed(task_id) => {
                self.on_completed(task_id).await;
                Ok(())
            }
            TaskEvent::Reactivated(task) => self.on_reactivated(&task).await,
            TaskEvent::Deleted(task_id) => {
                self.on_deleted(task_id).await;
                Ok(())
            }
            TaskEvent::CompletedPurged(task_ids) => {
                self.on_completed_purged(&task_ids).await;
                Ok(())
            }
        }
    }

    pub async fn on_created(&self, task: &Task) -> Result<(), SchedulingError> {
        debug!("Task {} created", task.id);
        self.scheduler.schedule(task).await
    }

    /// Reschedule when due time or completion changed; content-only edits
    /// leave the reminder as it is.
    pub async fn on_edited(&self, before: &Task, after: &Task) -> Result<(), SchedulingError> {
        if !after.schedule_changed(before) {
            debug!("Task {} edited without timing changes", after.id);
            return Ok(());
        }

        let result = self.scheduler.reschedule(after).await;
        if after.is_completed && !before.is_completed {
            self.notifier.dismiss(after.id);
        }
        result
    }

    pub async fn on_completed(&self, task_id: TaskId) {
        self.scheduler.cancel(task_id).await;
        self.notifier.dismiss(task_id);
        debug!("Task {} completed, reminder cleared", task_id);
    }

    pub async fn on_reactivated(&self, task: &Task) -> Result<(), SchedulingError> {
        debug!("Task {} reactivated", task.id);
        self.scheduler.schedule(task).await
    }

    pub async fn on_deleted(&self, task_id: TaskId) {
        self.scheduler.cancel(task_id).await;
        self.notifier.dismiss(task_id);
        debug!("Task {} deleted, reminder cleared", task_id);
    }

    pub async fn on_completed_purged(&self, task_ids: &[TaskId]) {
        self.scheduler.cancel_all(task_ids).await;
        for &task_id in task_ids {
            self.notifier.dismiss(task_id);
        }
        info!("Cleared reminders for {} purged task(s)", task_ids.len());
    }

    /// The "mark as completed" action offered on a shown reminder
    pub async fn complete_from_reminder(&self, task_id: TaskId) -> Result<(), ReminderError> {
        self.store
            .mark_completed(task_id)
            .await
            .map_err(ReminderError::StoreUpdateFailed)?;
        self.notifier.dismiss(task_id);
        self.scheduler.cancel(task_id).await;
        info!("Task {} completed from its reminder", task_id);
        Ok(())
    }
}
