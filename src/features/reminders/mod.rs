//! # Reminders Feature
//!
//! One reminder per task, fired a fixed lead time before the task is due.
//! Task lifecycle events drive the scheduler; the scheduler arms a clock and,
//! on fire, re-checks the task before asking the notifier to show anything.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 2.0.0: Clock, store and notifier injected at construction; per-task locking
//! - 1.0.0: Initial release

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod notifier;
pub mod policy;
pub mod scheduler;
pub mod store;

pub use clock::{Clock, TokioClock};
pub use coordinator::{TaskEvent, TaskLifecycleCoordinator};
pub use error::{ReminderError, SchedulingError, TimerError};
pub use notifier::{BroadcastNotifier, Notifier, ReminderEffect, ReminderNotification};
pub use policy::{ReminderPolicy, UrgencyClass};
pub use scheduler::{FireOutcome, ReminderJob, ReminderScheduler, SuppressReason};
pub use store::TaskStore;
