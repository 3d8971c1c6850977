//! # Reminder Policy
//!
//! Pure timing rules: when a task's reminder fires, whether it may be
//! scheduled, and how urgent the task is for display. Every function takes
//! `now` explicitly so results are deterministic.
//!
//! - **Version**: 1.2.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.2.0: Out-of-range fire times make a task ineligible instead of panicking
//! - 1.1.0: Added notification window and time-until-reminder helpers
//! - 1.0.0: Initial release with one-hour lead time

use crate::core::config::DEFAULT_LEAD_MINUTES;
use crate::core::Task;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Display urgency of a task, derived from `(due_time, is_completed, now)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UrgencyClass {
    Normal,
    /// Due within the lead time
    NearDeadline,
    /// Due time reached and still pending
    Overdue,
    Completed,
}

impl std::fmt::Display for UrgencyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrgencyClass::Normal => write!(f, "normal"),
            UrgencyClass::NearDeadline => write!(f, "near_deadline"),
            UrgencyClass::Overdue => write!(f, "overdue"),
            UrgencyClass::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderPolicy {
    /// Duration before due time at which the reminder fires
    lead_time: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_LEAD_MINUTES))
    }
}

impl ReminderPolicy {
    pub fn new(lead_time: Duration) -> Self {
        ReminderPolicy { lead_time }
    }

    pub fn lead_time(&self) -> Duration {
        self.lead_time
    }

    /// `None` when `due_time - lead_time` falls outside the representable range
    pub fn fire_time(&self, due_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        due_time.checked_sub_signed(self.lead_time)
    }

    /// A reminder may be armed only for pending tasks whose fire time is
    /// strictly in the future.
    pub fn is_eligible(&self, task: &Task, now: DateTime<Utc>) -> bool {
        !task.is_completed
            && self
                .fire_time(task.due_time)
                .is_some_and(|fire_time| fire_time > now)
    }

    /// Precedence: completed, then overdue, then near-deadline.
    ///
    /// A task exactly at its due time (`due_time == now`) is overdue.
    pub fn classify(&self, task: &Task, now: DateTime<Utc>) -> UrgencyClass {
        if task.is_completed {
            UrgencyClass::Completed
        } else if task.due_time <= now {
            UrgencyClass::Overdue
        } else if task.due_time - now <= self.lead_time {
            UrgencyClass::NearDeadline
        } else {
            UrgencyClass::Normal
        }
    }

    pub fn is_overdue(&self, task: &Task, now: DateTime<Utc>) -> bool {
        self.classify(task, now) == UrgencyClass::Overdue
    }

    pub fn is_near_deadline(&self, task: &Task, now: DateTime<Utc>) -> bool {
        self.classify(task, now) == UrgencyClass::NearDeadline
    }

    /// Signed time left until the reminder fires; negative once it has passed
    pub fn time_until_reminder(&self, task: &Task, now: DateTime<Utc>) -> Option<Duration> {
        self.fire_time(task.due_time).map(|fire_time| fire_time - now)
    }

    /// Due-time range `[now, now + lead_time]` of tasks whose reminder is due
    /// or imminent
    pub fn notification_window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = now
            .checked_add_signed(self.lead_time)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (now, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
    }

    fn task_due(due: DateTime<Utc>) -> Task {
        Task::new("Submit report", due).with_id(1)
    }

    #[test]
    fn test_fire_time_is_lead_time_before_due() {
        let policy = ReminderPolicy::default();
        let due = t0() + Duration::minutes(90);
        assert_eq!(policy.fire_time(due), Some(t0() + Duration::minutes(30)));
        assert_eq!(policy.lead_time(), Duration::hours(1));
    }

    #[test]
    fn test_eligibility() {
        let policy = ReminderPolicy::default();
        let now = t0();

        for minutes in [61, 90, 24 * 60] {
            let task = task_due(now + Duration::minutes(minutes));
            assert!(policy.is_eligible(&task, now), "due in {minutes}m");
            assert!(!policy.is_eligible(&task.completed(), now));
        }

        // Fire time exactly now or in the past is not eligible
        for minutes in [60, 30, 0, -10] {
            let task = task_due(now + Duration::minutes(minutes));
            assert!(!policy.is_eligible(&task, now), "due in {minutes}m");
        }
    }

    #[test]
    fn test_classify_scenario() {
        let policy = ReminderPolicy::default();
        let task = task_due(t0() + Duration::minutes(90));

        assert_eq!(
            policy.classify(&task, t0() + Duration::minutes(25)),
            UrgencyClass::Normal
        );
        assert_eq!(
            policy.classify(&task, t0() + Duration::minutes(35)),
            UrgencyClass::NearDeadline
        );
        assert_eq!(
            policy.classify(&task, t0() + Duration::minutes(91)),
            UrgencyClass::Overdue
        );
    }

    #[test]
    fn test_classify_boundaries() {
        let policy = ReminderPolicy::default();
        let due = t0();
        let task = task_due(due);

        // Exactly at due time counts as overdue
        assert_eq!(policy.classify(&task, due), UrgencyClass::Overdue);
        // Exactly one lead time out is near-deadline
        assert_eq!(
            policy.classify(&task, due - Duration::hours(1)),
            UrgencyClass::NearDeadline
        );
        assert_eq!(
            policy.classify(&task, due - Duration::hours(1) - Duration::seconds(1)),
            UrgencyClass::Normal
        );
    }

    #[test]
    fn test_completed_overrides_overdue() {
        let policy = ReminderPolicy::default();
        let task = task_due(t0() - Duration::days(2)).completed();
        assert_eq!(policy.classify(&task, t0()), UrgencyClass::Completed);
        assert!(!policy.is_overdue(&task, t0()));
        assert!(!policy.is_near_deadline(&task, t0()));
    }

    #[test]
    fn test_time_until_reminder_and_window() {
        let policy = ReminderPolicy::new(Duration::minutes(15));
        let task = task_due(t0() + Duration::minutes(20));

        assert_eq!(
            policy.time_until_reminder(&task, t0()),
            Some(Duration::minutes(5))
        );
        assert_eq!(
            policy.time_until_reminder(&task, t0() + Duration::minutes(10)),
            Some(Duration::minutes(-5))
        );

        let (start, end) = policy.notification_window(t0());
        assert_eq!(start, t0());
        assert_eq!(end, t0() + Duration::minutes(15));
    }

    #[test]
    fn test_huge_lead_time_is_ineligible() {
        let policy = ReminderPolicy::new(Duration::days(365 * 400_000));
        let task = task_due(t0() + Duration::days(2));

        assert_eq!(policy.fire_time(task.due_time), None);
        assert!(!policy.is_eligible(&task, t0()));
        assert_eq!(policy.time_until_reminder(&task, t0()), None);
        assert_eq!(policy.classify(&task, t0()), UrgencyClass::NearDeadline);
        assert_eq!(policy.notification_window(t0()).1, DateTime::<Utc>::MAX_UTC);
    }
}
