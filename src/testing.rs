//! Test doubles for the reminder engine's collaborators.
//!
//! Used by the unit tests and available to hosts that want to exercise
//! their wiring without real timers or storage.

use crate::core::{Task, TaskId};
use crate::features::reminders::clock::Clock;
use crate::features::reminders::error::TimerError;
use crate::features::reminders::notifier::Notifier;
use crate::features::reminders::store::TaskStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Clock whose time only moves when told to. Armings are recorded, never
/// delivered; [`advance`](ManualClock::advance) reports which became due.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    armed: DashMap<TaskId, DateTime<Utc>>,
    disarmed: Mutex<Vec<TaskId>>,
    rejection: Mutex<Option<TimerError>>,
    exact_timers: AtomicBool,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(now),
            armed: DashMap::new(),
            disarmed: Mutex::new(Vec::new()),
            rejection: Mutex::new(None),
            exact_timers: AtomicBool::new(true),
        }
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move time forward and take every arming that is now due, in fire order
    pub fn advance(&self, by: Duration) -> Vec<TaskId> {
        let now = {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += by;
            *now
        };

        let mut due: Vec<(DateTime<Utc>, TaskId)> = self
            .armed
            .iter()
            .filter(|entry| *entry.value() <= now)
            .map(|entry| (*entry.value(), *entry.key()))
            .collect();
        due.sort();

        for (_, task_id) in &due {
            self.armed.remove(task_id);
        }
        due.into_iter().map(|(_, task_id)| task_id).collect()
    }

    pub fn armed_at(&self, task_id: TaskId) -> Option<DateTime<Utc>> {
        self.armed.get(&task_id).map(|at| *at.value())
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Every task id passed to `disarm` for an existing arming
    pub fn disarmed(&self) -> Vec<TaskId> {
        self.disarmed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Refuse all further armings with `error`
    pub fn reject_with(&self, error: TimerError) {
        *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn accept(&self) {
        *self.rejection.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Behave like a host that denies exact timers
    pub fn deny_exact_timers(&self) {
        self.exact_timers.store(false, Ordering::SeqCst);
        self.reject_with(TimerError::NotPermitted);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm_one_shot(&self, task_id: TaskId, at: DateTime<Utc>) -> Result<(), TimerError> {
        if let Some(error) = self
            .rejection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(error);
        }
        self.armed.insert(task_id, at);
        Ok(())
    }

    fn disarm(&self, task_id: TaskId) {
        if self.armed.remove(&task_id).is_some() {
            self.disarmed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(task_id);
        }
    }

    fn check_exact_timers(&self) -> Result<(), TimerError> {
        if self.exact_timers.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TimerError::NotPermitted)
        }
    }
}

/// Task store kept in memory, with switchable failures and read latency
#[derive(Debug)]
pub struct InMemoryTaskStore {
    tasks: DashMap<TaskId, Task>,
    next_id: AtomicI64,
    failing: AtomicBool,
    lookup_delay: Mutex<Option<std::time::Duration>>,
    lookups: AtomicUsize,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        InMemoryTaskStore {
            tasks: DashMap::new(),
            next_id: AtomicI64::new(1),
            failing: AtomicBool::new(false),
            lookup_delay: Mutex::new(None),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Store a new task, assigning an id when it has none
    pub fn insert(&self, mut task: Task) -> Task {
        if task.id == 0 {
            task.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        }
        self.tasks.insert(task.id, task.clone());
        task
    }

    /// Overwrite a task as-is
    pub fn put(&self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn remove(&self, task_id: TaskId) -> Option<Task> {
        self.tasks.remove(&task_id).map(|(_, task)| task)
    }

    pub fn get(&self, task_id: TaskId) -> Option<Task> {
        self.tasks.get(&task_id).map(|task| task.value().clone())
    }

    /// Make every read fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay each `get_by_id` by `delay`
    pub fn set_lookup_delay(&self, delay: std::time::Duration) {
        *self
            .lookup_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Number of `get_by_id` calls so far
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(anyhow::anyhow!("simulated store outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get_by_id(&self, task_id: TaskId) -> Result<Option<Task>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = *self
            .lookup_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failing()?;
        Ok(self.get(task_id))
    }

    async fn list_pending(&self) -> Result<Vec<Task>> {
        self.check_failing()?;
        let mut pending: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| !task.is_completed)
            .map(|task| task.value().clone())
            .collect();
        pending.sort_by_key(|task| (task.due_time, task.id));
        Ok(pending)
    }

    async fn mark_completed(&self, task_id: TaskId) -> Result<()> {
        self.check_failing()?;
        if let Some(mut task) = self.tasks.get_mut(&task_id) {
            task.is_completed = true;
            task.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// Something the engine asked a notifier to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Present(TaskId),
    Dismiss(TaskId),
    DismissAll,
}

/// Notifier that records every request in order
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn presented(&self) -> Vec<TaskId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                NotifierCall::Present(task_id) => Some(task_id),
                _ => None,
            })
            .collect()
    }

    pub fn dismissed(&self) -> Vec<TaskId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                NotifierCall::Dismiss(task_id) => Some(task_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: NotifierCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl Notifier for RecordingNotifier {
    fn present(&self, task: &Task) {
        self.record(NotifierCall::Present(task.id));
    }

    fn dismiss(&self, task_id: TaskId) {
        self.record(NotifierCall::Dismiss(task_id));
    }

    fn dismiss_all(&self) {
        self.record(NotifierCall::DismissAll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advance_reports_due_in_order() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.arm_one_shot(2, start + Duration::minutes(20)).unwrap();
        clock.arm_one_shot(1, start + Duration::minutes(10)).unwrap();
        clock.arm_one_shot(3, start + Duration::minutes(90)).unwrap();

        assert_eq!(clock.advance(Duration::minutes(30)), vec![1, 2]);
        assert_eq!(clock.now(), start + Duration::minutes(30));
        assert_eq!(clock.armed_count(), 1);
        assert!(clock.advance(Duration::minutes(30)).is_empty());
    }

    #[test]
    fn test_manual_clock_rejection() {
        let clock = ManualClock::new(Utc::now());
        clock.reject_with(TimerError::NotPermitted);
        assert_eq!(
            clock.arm_one_shot(1, Utc::now()),
            Err(TimerError::NotPermitted)
        );
        clock.accept();
        assert!(clock.arm_one_shot(1, Utc::now()).is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_store_pending_and_failures() {
        let store = InMemoryTaskStore::new();
        let now = Utc::now();
        let late = store.insert(Task::new("Late", now + Duration::hours(5)));
        let early = store.insert(Task::new("Early", now + Duration::hours(2)));
        store.insert(Task::new("Done", now + Duration::hours(1)).completed());

        let pending = store.list_pending().await.unwrap();
        let ids: Vec<TaskId> = pending.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);

        store.mark_completed(early.id).await.unwrap();
        assert!(store.get(early.id).unwrap().is_completed);

        store.set_failing(true);
        assert!(store.get_by_id(late.id).await.is_err());
        assert_eq!(store.lookup_count(), 1);
    }
}
