//! # Feature: Reminder Scheduler
//!
//! Owns the pending reminder jobs, at most one per task, and arms them
//! against a [`Clock`]. When a timer elapses the task is re-read from the
//! store and the reminder is presented only if the task still exists and is
//! still pending.
//!
//! Operations on the same task id are serialized through a per-task slot
//! lock; different tasks never contend. The store read in [`on_fire`] happens
//! outside the lock, and any operation that lands on the slot meanwhile wins
//! over the in-flight fire.
//!
//! [`on_fire`]: ReminderScheduler::on_fire
//!
//! - **Version**: 1.4.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.4.0: Early fires re-arm the clock instead of dropping the reminder
//! - 1.3.0: Fires racing a newer operation on the same task are suppressed
//! - 1.2.0: Batch scheduling collects every per-task failure
//! - 1.1.0: Re-arm pending tasks on startup
//! - 1.0.0: Initial release

use crate::core::{Task, TaskId};
use crate::features::reminders::clock::Clock;
use crate::features::reminders::error::{ReminderError, SchedulingError, TimerError};
use crate::features::reminders::notifier::Notifier;
use crate::features::reminders::policy::{ReminderPolicy, UrgencyClass};
use crate::features::reminders::store::TaskStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A reminder waiting to fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderJob {
    pub task_id: TaskId,
    /// `due_time - lead_time`
    pub fire_time: DateTime<Utc>,
    /// Whether the clock currently holds this job
    pub armed: bool,
}

/// Why a fire did not produce a reminder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressReason {
    /// Task was deleted before the reminder fired
    TaskMissing,
    /// Task was completed before the reminder fired
    TaskCompleted,
    /// A newer operation on the task landed while the fire was in flight
    Superseded,
    StoreLookupFailed(String),
}

/// Result of handling a timer fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// The reminder was handed to the notifier
    Presented(Task),
    Suppressed(SuppressReason),
    /// No job was due for this task. A fire that precedes a pending job
    /// re-arms the clock for the job's fire time.
    Stale,
}

/// Per-task state guarded by the slot lock
#[derive(Debug, Default)]
struct Slot {
    job: Option<ReminderJob>,
    /// Bumped by every cancel or arm
    epoch: u64,
}

pub struct ReminderScheduler {
    slots: DashMap<TaskId, Arc<Mutex<Slot>>>,
    policy: ReminderPolicy,
    clock: Arc<dyn Clock>,
    store: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
}

impl ReminderScheduler {
    pub fn new(
        policy: ReminderPolicy,
        clock: Arc<dyn Clock>,
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        ReminderScheduler {
            slots: DashMap::new(),
            policy,
            clock,
            store,
            notifier,
        }
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    /// Whether the clock grants exact timers at all
    pub fn check_exact_timers(&self) -> Result<(), TimerError> {
        self.clock.check_exact_timers()
    }

    /// Display urgency of `task` right now
    pub fn urgency(&self, task: &Task) -> UrgencyClass {
        self.policy.classify(task, self.clock.now())
    }

    /// Arm a reminder for `task`, replacing any existing one.
    ///
    /// Ineligible tasks (completed, or fire time already passed) are skipped
    /// without error and leave any existing job untouched.
    pub async fn schedule(&self, task: &Task) -> Result<(), SchedulingError> {
        let result = {
            let slot = self.slot(task.id);
            let mut state = slot.lock().await;
            self.schedule_locked(&mut state, task)
        };
        self.prune(task.id);
        result.map(|_| ())
    }

    /// Drop the reminder for `task_id`, if any. Safe to repeat.
    pub async fn cancel(&self, task_id: TaskId) {
        {
            let slot = self.slot(task_id);
            let mut state = slot.lock().await;
            self.cancel_locked(&mut state, task_id);
        }
        self.prune(task_id);
    }

    /// Cancel then schedule under a single slot lock, so an edit always
    /// clears stale timing even when the new due time is ineligible.
    pub async fn reschedule(&self, task: &Task) -> Result<(), SchedulingError> {
        let result = {
            let slot = self.slot(task.id);
            let mut state = slot.lock().await;
            self.cancel_locked(&mut state, task.id);
            self.schedule_locked(&mut state, task)
        };
        self.prune(task.id);
        result.map(|_| ())
    }

    /// Handle an elapsed timer for `task_id`.
    ///
    /// Consumes the job, re-reads the task, and presents a reminder only if
    /// the task still exists, is pending, and nothing else touched the task
    /// during the read.
    pub async fn on_fire(&self, task_id: TaskId) -> FireOutcome {
        let outcome = self.fire(task_id).await;
        self.prune(task_id);
        outcome
    }

    /// Schedule each task in turn; failures do not stop the rest.
    ///
    /// Returns how many reminders were armed.
    pub async fn schedule_all(&self, tasks: &[Task]) -> Result<usize, ReminderError> {
        let mut armed = 0;
        let mut failures = Vec::new();

        for task in tasks {
            let result = {
                let slot = self.slot(task.id);
                let mut state = slot.lock().await;
                self.schedule_locked(&mut state, task)
            };
            self.prune(task.id);

            match result {
                Ok(true) => armed += 1,
                Ok(false) => {}
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            Ok(armed)
        } else {
            Err(ReminderError::Batch(failures))
        }
    }

    pub async fn cancel_all(&self, task_ids: &[TaskId]) {
        for &task_id in task_ids {
            self.cancel(task_id).await;
        }
    }

    /// Arm reminders for every eligible pending task in the store.
    ///
    /// Timers do not survive a restart, so hosts call this once at startup.
    pub async fn rearm_pending(&self) -> Result<usize, ReminderError> {
        let pending = self
            .store
            .list_pending()
            .await
            .map_err(ReminderError::StoreLookupFailed)?;

        let armed = self.schedule_all(&pending).await?;
        info!(
            "Re-armed {} reminder(s) from {} pending task(s)",
            armed,
            pending.len()
        );
        Ok(armed)
    }

    /// Drive fires delivered by the clock until the channel closes.
    ///
    /// Each fire is handled on its own task so a slow store read for one
    /// task never delays another.
    pub async fn run(self: Arc<Self>, mut fires: mpsc::UnboundedReceiver<TaskId>) {
        info!("Reminder scheduler started");

        while let Some(task_id) = fires.recv().await {
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                scheduler.on_fire(task_id).await;
            });
        }

        info!("Fire channel closed, reminder scheduler stopped");
    }

    /// Snapshot of the job for `task_id`
    pub async fn job(&self, task_id: TaskId) -> Option<ReminderJob> {
        let slot = self.slots.get(&task_id).map(|s| Arc::clone(s.value()))?;
        let state = slot.lock().await;
        state.job.clone()
    }

    /// Snapshot of all pending jobs, ordered by fire time
    pub async fn pending_jobs(&self) -> Vec<ReminderJob> {
        let slots: Vec<Arc<Mutex<Slot>>> =
            self.slots.iter().map(|s| Arc::clone(s.value())).collect();

        let mut jobs = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(job) = slot.lock().await.job.clone() {
                jobs.push(job);
            }
        }
        jobs.sort_by_key(|job| (job.fire_time, job.task_id));
        jobs
    }

    async fn fire(&self, task_id: TaskId) -> FireOutcome {
        let slot = self.slot(task_id);

        let epoch = {
            let mut state = slot.lock().await;
            let now = self.clock.now();
            let Some(fire_time) = state.job.as_ref().map(|job| job.fire_time) else {
                debug!("Fire for task {} has no pending job, ignoring", task_id);
                return FireOutcome::Stale;
            };
            // Either a replaced arming slipped through or wall time stepped
            // back after arming. The clock may no longer hold the job.
            if fire_time > now {
                debug!(
                    "Fire for task {} precedes its job ({}), re-arming",
                    task_id, fire_time
                );
                self.rearm_locked(&mut state, task_id, fire_time);
                return FireOutcome::Stale;
            }
            state.job = None;
            state.epoch
        };

        let lookup = self.store.get_by_id(task_id).await;

        let state = slot.lock().await;
        if state.epoch != epoch {
            debug!("Reminder for task {} superseded during lookup", task_id);
            return FireOutcome::Suppressed(SuppressReason::Superseded);
        }

        match lookup {
            Err(e) => {
                warn!("Task lookup failed for reminder {}: {:#}", task_id, e);
                FireOutcome::Suppressed(SuppressReason::StoreLookupFailed(e.to_string()))
            }
            Ok(None) => {
                debug!("Task {} deleted before its reminder fired", task_id);
                FireOutcome::Suppressed(SuppressReason::TaskMissing)
            }
            Ok(Some(task)) if task.is_completed => {
                debug!("Task {} completed before its reminder fired", task_id);
                FireOutcome::Suppressed(SuppressReason::TaskCompleted)
            }
            Ok(Some(task)) => {
                // Presented under the slot lock so a concurrent cancel and
                // dismiss is ordered entirely before or after it.
                self.notifier.present(&task);
                info!("Presented reminder for task {} ({})", task.id, task.title);
                FireOutcome::Presented(task)
            }
        }
    }

    /// Returns whether a job was armed
    fn schedule_locked(&self, state: &mut Slot, task: &Task) -> Result<bool, SchedulingError> {
        let now = self.clock.now();
        let fire_time = match self.policy.fire_time(task.due_time) {
            Some(fire_time) if !task.is_completed && fire_time > now => fire_time,
            _ => {
                debug!(
                    "Task {} not eligible for a reminder (completed: {}, due: {})",
                    task.id, task.is_completed, task.due_time
                );
                return Ok(false);
            }
        };

        self.cancel_locked(state, task.id);

        match self.clock.arm_one_shot(task.id, fire_time) {
            Ok(()) => {
                state.job = Some(ReminderJob {
                    task_id: task.id,
                    fire_time,
                    armed: true,
                });
                info!("Scheduled reminder for task {} at {}", task.id, fire_time);
                Ok(true)
            }
            Err(source) => {
                warn!("Timer rejected reminder for task {}: {}", task.id, source);
                Err(SchedulingError::TimerRejected {
                    task_id: task.id,
                    source,
                })
            }
        }
    }

    /// Hand the pending job back to the clock. The job stays either way;
    /// `armed` records whether the clock took it.
    fn rearm_locked(&self, state: &mut Slot, task_id: TaskId, fire_time: DateTime<Utc>) {
        let armed = match self.clock.arm_one_shot(task_id, fire_time) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not re-arm reminder for task {}: {}", task_id, e);
                false
            }
        };
        if let Some(job) = state.job.as_mut() {
            job.armed = armed;
        }
    }

    fn cancel_locked(&self, state: &mut Slot, task_id: TaskId) {
        state.epoch += 1;
        if let Some(job) = state.job.take() {
            if job.armed {
                self.clock.disarm(task_id);
            }
            debug!("Cancelled reminder for task {} (was due {})", task_id, job.fire_time);
        }
    }

    fn slot(&self, task_id: TaskId) -> Arc<Mutex<Slot>> {
        Arc::clone(self.slots.entry(task_id).or_default().value())
    }

    /// Remove an empty slot nobody else holds. Runs under the shard lock, so
    /// no caller can pick up the slot while it is being removed.
    fn prune(&self, task_id: TaskId) {
        self.slots.remove_if(&task_id, |_, slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .try_lock()
                    .map(|state| state.job.is_none())
                    .unwrap_or(false)
        });
    }
}
