//! # Task Model
//!
//! The task record as seen by the reminder engine. Records are owned by the
//! store; the engine only ever refers to them by [`TaskId`].
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: Added categories with display names
//! - 1.0.0: Initial release

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identity assigned by the store on insert
pub type TaskId = i64;

/// Predefined task categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Work,
    Personal,
    Study,
    Health,
    Shopping,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Work,
        Category::Personal,
        Category::Study,
        Category::Health,
        Category::Shopping,
        Category::Other,
    ];

    /// Human readable label shown in reminders
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Work => "Work",
            Category::Personal => "Personal",
            Category::Study => "Study",
            Category::Health => "Health",
            Category::Shopping => "Shopping",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Work => write!(f, "work"),
            Category::Personal => write!(f, "personal"),
            Category::Study => write!(f, "study"),
            Category::Health => write!(f, "health"),
            Category::Shopping => write!(f, "shopping"),
            Category::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "work" => Ok(Category::Work),
            "personal" => Ok(Category::Personal),
            "study" => Ok(Category::Study),
            "health" => Ok(Category::Health),
            "shopping" => Ok(Category::Shopping),
            "other" => Ok(Category::Other),
            _ => Err(anyhow::anyhow!("Invalid task category: {}", s)),
        }
    }
}

/// A task with a due time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identity (0 until inserted)
    pub id: TaskId,

    pub title: String,

    pub description: String,

    /// When the task is due
    pub due_time: DateTime<Utc>,

    pub category: Category,

    /// Set by completion, cleared by reactivation
    pub is_completed: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending, not-yet-stored task
    pub fn new(title: impl Into<String>, due_time: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: title.into(),
            description: String::new(),
            due_time,
            category: Category::Other,
            is_completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn completed(mut self) -> Self {
        self.is_completed = true;
        self
    }

    /// Whether an edit from `previous` to `self` can change when (or whether)
    /// a reminder fires. Title, description and category never do.
    pub fn schedule_changed(&self, previous: &Task) -> bool {
        self.due_time != previous.due_time || self.is_completed != previous.is_completed
    }
}
