//! # Features
//!
//! - **reminders**: due-time reminders driven by task lifecycle events

pub mod reminders;
