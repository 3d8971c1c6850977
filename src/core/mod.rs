//! # Core Module
//!
//! Core domain types and configuration for the reminder engine.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Task model moved here from the database layer
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod task;

// Re-export commonly used items
pub use config::Config;
pub use task::{Category, Task, TaskId};
