//! # Clock
//!
//! Abstraction over "now" and a one-shot wall-clock timer keyed by task id.
//! [`TokioClock`] is the in-process implementation: each arming is a spawned
//! sleeper that delivers the task id on a channel when it elapses.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Exact-timer capability check surfaced at startup
//! - 1.0.0: Initial release

use crate::core::TaskId;
use crate::features::reminders::error::TimerError;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Timer facility the scheduler arms reminders against.
///
/// A successful [`arm_one_shot`](Clock::arm_one_shot) yields at most one fire,
/// never earlier than the requested instant (possibly later).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Arm a single future fire for `task_id`, replacing any prior arming
    fn arm_one_shot(&self, task_id: TaskId, at: DateTime<Utc>) -> Result<(), TimerError>;

    /// Cancel a prior arming; no-op when none exists
    fn disarm(&self, task_id: TaskId);

    /// Whether the host grants exact timers at all
    fn check_exact_timers(&self) -> Result<(), TimerError> {
        Ok(())
    }
}

/// Wall clock backed by tokio timers
pub struct TokioClock {
    timers: Arc<DashMap<TaskId, (u64, JoinHandle<()>)>>,
    fire_tx: mpsc::UnboundedSender<TaskId>,
    next_generation: AtomicU64,
    exact_timers: bool,
}

impl TokioClock {
    /// Create the clock and the receiving end its fires are delivered on
    pub fn new(exact_timers: bool) -> (Self, mpsc::UnboundedReceiver<TaskId>) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        let clock = TokioClock {
            timers: Arc::new(DashMap::new()),
            fire_tx,
            next_generation: AtomicU64::new(0),
            exact_timers,
        };
        (clock, fire_rx)
    }

    /// Number of timers currently waiting to elapse
    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn arm_one_shot(&self, task_id: TaskId, at: DateTime<Utc>) -> Result<(), TimerError> {
        self.check_exact_timers()?;
        if self.fire_tx.is_closed() {
            return Err(TimerError::Unavailable("fire receiver dropped".to_string()));
        }
        let runtime = Handle::try_current()
            .map_err(|e| TimerError::Unavailable(format!("no async runtime: {e}")))?;

        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        // Hold the shard while spawning so the sleeper cannot clean up
        // before its own handle is recorded.
        let entry = self.timers.entry(task_id);
        let fire_tx = self.fire_tx.clone();
        let timers = Arc::clone(&self.timers);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            // The sleep runs on the monotonic clock; keep going until wall
            // time has also reached `at`
            while let Ok(remaining) = (at - Utc::now()).to_std() {
                if remaining.is_zero() {
                    break;
                }
                tokio::time::sleep(remaining).await;
            }
            timers.remove_if(&task_id, |_, (armed, _)| *armed == generation);
            if fire_tx.send(task_id).is_err() {
                debug!("Fire for task {} dropped, receiver closed", task_id);
            }
        });

        match entry {
            Entry::Occupied(mut occupied) => {
                let (_, previous) = occupied.insert((generation, handle));
                previous.abort();
            }
            Entry::Vacant(vacant) => {
                vacant.insert((generation, handle));
            }
        }

        debug!("Armed timer for task {} at {} ({:?} from now)", task_id, at, delay);
        Ok(())
    }

    fn disarm(&self, task_id: TaskId) {
        if let Some((_, (_, handle))) = self.timers.remove(&task_id) {
            handle.abort();
            debug!("Disarmed timer for task {}", task_id);
        }
    }

    fn check_exact_timers(&self) -> Result<(), TimerError> {
        if self.exact_timers {
            Ok(())
        } else {
            Err(TimerError::NotPermitted)
        }
    }
}

impl Drop for TokioClock {
    fn drop(&mut self) {
        for entry in self.timers.iter() {
            entry.value().1.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_arm_fires_once() {
        let (clock, mut fires) = TokioClock::new(true);
        clock
            .arm_one_shot(7, Utc::now() + Duration::milliseconds(30))
            .unwrap();
        assert_eq!(clock.armed_count(), 1);

        let fired = timeout(std::time::Duration::from_secs(2), fires.recv())
            .await
            .unwrap();
        assert_eq!(fired, Some(7));

        sleep(std::time::Duration::from_millis(50)).await;
        assert!(fires.try_recv().is_err());
        assert_eq!(clock.armed_count(), 0);
    }

    #[tokio::test]
    async fn test_rearm_replaces_prior_arming() {
        let (clock, mut fires) = TokioClock::new(true);
        clock
            .arm_one_shot(1, Utc::now() + Duration::milliseconds(20))
            .unwrap();
        clock
            .arm_one_shot(1, Utc::now() + Duration::milliseconds(60))
            .unwrap();
        assert_eq!(clock.armed_count(), 1);

        sleep(std::time::Duration::from_millis(40)).await;
        assert!(fires.try_recv().is_err(), "superseded arming must not fire");

        let fired = timeout(std::time::Duration::from_secs(2), fires.recv())
            .await
            .unwrap();
        assert_eq!(fired, Some(1));
        sleep(std::time::Duration::from_millis(50)).await;
        assert!(fires.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disarm_prevents_fire() {
        let (clock, mut fires) = TokioClock::new(true);
        clock
            .arm_one_shot(3, Utc::now() + Duration::milliseconds(30))
            .unwrap();
        clock.disarm(3);
        clock.disarm(3);
        assert_eq!(clock.armed_count(), 0);

        sleep(std::time::Duration::from_millis(80)).await;
        assert!(fires.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_past_instant_fires_promptly() {
        let (clock, mut fires) = TokioClock::new(true);
        clock
            .arm_one_shot(9, Utc::now() - Duration::minutes(5))
            .unwrap();
        let fired = timeout(std::time::Duration::from_secs(2), fires.recv())
            .await
            .unwrap();
        assert_eq!(fired, Some(9));
    }

    #[tokio::test]
    async fn test_rejects_without_exact_timers() {
        let (clock, _fires) = TokioClock::new(false);
        assert_eq!(clock.check_exact_timers(), Err(TimerError::NotPermitted));
        let result = clock.arm_one_shot(1, Utc::now() + Duration::hours(1));
        assert_eq!(result, Err(TimerError::NotPermitted));
        assert_eq!(clock.armed_count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_when_receiver_dropped() {
        let (clock, fires) = TokioClock::new(true);
        drop(fires);
        let result = clock.arm_one_shot(1, Utc::now() + Duration::hours(1));
        assert!(matches!(result, Err(TimerError::Unavailable(_))));
    }
}
