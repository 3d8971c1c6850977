//! # organiza
//!
//! Task reminder engine: one reminder per task, fired a fixed lead time
//! before the task is due, re-checked against the store when it fires.

// Core layer - task model and configuration
pub mod core;

// Features layer - reminder scheduling
pub mod features;

// Infrastructure - SQLite task store
pub mod database;

// Test doubles for clocks, stores and notifiers
pub mod testing;

// Re-export core items
pub use crate::core::{Category, Config, Task, TaskId};

// Re-export feature items
pub use features::reminders::{
    BroadcastNotifier, Clock, FireOutcome, Notifier, ReminderEffect, ReminderError,
    ReminderPolicy, ReminderScheduler, SchedulingError, TaskEvent, TaskLifecycleCoordinator,
    TaskStore, TimerError, TokioClock, UrgencyClass,
};

pub use database::TaskDatabase;
