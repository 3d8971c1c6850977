//! Error taxonomy for reminder scheduling.
//!
//! Nothing here is fatal: every failure degrades to "the reminder did not
//! fire" and is either returned to the caller or logged.

use crate::core::TaskId;
use thiserror::Error;

/// Refusals from the wall-clock timer facility
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    /// The host denies exact timers altogether
    #[error("exact timers are not permitted on this host")]
    NotPermitted,

    /// The facility could not accept the arming right now
    #[error("timer facility unavailable: {0}")]
    Unavailable(String),
}

/// Failure to arm a reminder for a single task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    #[error("timer rejected reminder for task {task_id}: {source}")]
    TimerRejected {
        task_id: TaskId,
        #[source]
        source: TimerError,
    },
}

impl SchedulingError {
    pub fn task_id(&self) -> TaskId {
        match self {
            SchedulingError::TimerRejected { task_id, .. } => *task_id,
        }
    }
}

/// Engine-level failures surfaced by startup and batch operations
#[derive(Debug, Error)]
pub enum ReminderError {
    /// Surfaced once at startup when the host refuses exact timers
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// The store could not be read
    #[error("task store lookup failed: {0}")]
    StoreLookupFailed(#[source] anyhow::Error),

    /// The store rejected a write
    #[error("task store update failed: {0}")]
    StoreUpdateFailed(#[source] anyhow::Error),

    /// Some items of a batch could not be armed; the rest were attempted
    #[error("{} reminder(s) could not be scheduled", .0.len())]
    Batch(Vec<SchedulingError>),
}
