//! # Reminder Notifications
//!
//! The user-visible side of a reminder is an opaque effect. The engine only
//! asks a [`Notifier`] to present or dismiss; [`BroadcastNotifier`] turns those
//! requests into [`ReminderEffect`]s for any number of presentation layers.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Reminder content carries a mark-as-completed action
//! - 1.0.0: Initial release with broadcast delivery

use crate::core::{Task, TaskId};
use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Offset keeping reminder notification ids clear of other host notifications
pub const NOTIFICATION_ID_BASE: i64 = 1000;

/// Broadcast channel capacity for effects
const EFFECT_CHANNEL_CAPACITY: usize = 256;

/// Receives the engine's present/dismiss requests
pub trait Notifier: Send + Sync {
    /// Show a reminder for `task`
    fn present(&self, task: &Task);

    /// Remove a previously shown reminder, if any
    fn dismiss(&self, task_id: TaskId);

    fn dismiss_all(&self);
}

/// Actions offered alongside a shown reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderAction {
    MarkCompleted,
}

/// Rendered content of a reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderNotification {
    pub notification_id: i64,
    pub task_id: TaskId,
    pub title: String,
    pub body: String,
    /// Long-form body for expanded views
    pub expanded_body: String,
    pub actions: Vec<ReminderAction>,
}

impl ReminderNotification {
    pub fn from_task(task: &Task) -> Self {
        ReminderNotification {
            notification_id: notification_id(task.id),
            task_id: task.id,
            title: format!("Reminder: {}", task.title),
            body: task.description.clone(),
            expanded_body: format!(
                "{}\n\nCategory: {}",
                task.description,
                task.category.display_name()
            ),
            actions: vec![ReminderAction::MarkCompleted],
        }
    }
}

/// Host notification id for a task's reminder
pub fn notification_id(task_id: TaskId) -> i64 {
    NOTIFICATION_ID_BASE.saturating_add(task_id)
}

/// Discrete effect published to presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReminderEffect {
    Present { notification: ReminderNotification },
    Dismiss { task_id: TaskId, notification_id: i64 },
    DismissAll,
}

impl ReminderEffect {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Publishes effects on a broadcast channel
#[derive(Clone)]
pub struct BroadcastNotifier {
    effect_tx: broadcast::Sender<ReminderEffect>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (effect_tx, _) = broadcast::channel(EFFECT_CHANNEL_CAPACITY);
        BroadcastNotifier { effect_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEffect> {
        self.effect_tx.subscribe()
    }

    fn publish(&self, effect: ReminderEffect) {
        // No subscribers is not an error; the effect is simply unseen
        if self.effect_tx.send(effect).is_err() {
            debug!("Reminder effect published with no subscribers");
        }
    }
}

impl Notifier for BroadcastNotifier {
    fn present(&self, task: &Task) {
        self.publish(ReminderEffect::Present {
            notification: ReminderNotification::from_task(task),
        });
    }

    fn dismiss(&self, task_id: TaskId) {
        self.publish(ReminderEffect::Dismiss {
            task_id,
            notification_id: notification_id(task_id),
        });
    }

    fn dismiss_all(&self) {
        self.publish(ReminderEffect::DismissAll);
    }
}
