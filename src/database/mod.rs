//! # Task Database
//!
//! SQLite persistence for task records. Implements [`TaskStore`] so the
//! reminder engine can re-read tasks at fire time and re-arm pending tasks
//! on startup, plus the list/query/update surface the task screens use.
//!
//! Timestamps are stored as UTC milliseconds.
//!
//! - **Version**: 1.1.0
//! - **Since**: 1.0.0
//!
//! ## Changelog
//! - 1.1.0: delete_completed returns removed ids for reminder cleanup
//! - 1.0.0: Initial release

use crate::core::{Category, Task, TaskId};
use crate::features::reminders::store::TaskStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sqlite::{Connection, State, Statement, Value};
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        due_time INTEGER NOT NULL,
        category TEXT NOT NULL,
        is_completed INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tasks_due_time ON tasks(due_time);
    CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(is_completed);
";

const TASK_COLUMNS: &str =
    "id, title, description, due_time, category, is_completed, created_at, updated_at";

#[derive(Clone)]
pub struct TaskDatabase {
    connection: Arc<Mutex<Connection>>,
}

impl TaskDatabase {
    /// Open (or create) the database at `path`; `:memory:` for a throwaway one
    pub async fn new(path: &str) -> Result<Self> {
        let connection =
            sqlite::open(path).with_context(|| format!("Failed to open database at {path}"))?;
        connection.execute(SCHEMA)?;
        info!("Task database ready at {}", path);

        Ok(TaskDatabase {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Store a new task and return its assigned id
    pub async fn insert_task(&self, task: &Task) -> Result<TaskId> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "INSERT INTO tasks (title, description, due_time, category, is_completed, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )?;
        bind_all(
            &mut statement,
            vec![
                Value::String(task.title.clone()),
                Value::String(task.description.clone()),
                Value::Integer(task.due_time.timestamp_millis()),
                Value::String(task.category.to_string()),
                Value::Integer(i64::from(task.is_completed)),
                Value::Integer(task.created_at.timestamp_millis()),
                Value::Integer(task.updated_at.timestamp_millis()),
            ],
        )?;
        statement.next()?;

        let mut last_id = conn.prepare("SELECT last_insert_rowid() AS id")?;
        last_id.next()?;
        let id = last_id.read::<i64, _>("id")?;
        debug!("Inserted task {} ({})", id, task.title);
        Ok(id)
    }

    /// Overwrite every field of an existing task; `updated_at` is set to now
    pub async fn update_task(&self, task: &Task) -> Result<()> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(
            "UPDATE tasks SET title = ?, description = ?, due_time = ?, category = ?,
             is_completed = ?, updated_at = ? WHERE id = ?",
        )?;
        bind_all(
            &mut statement,
            vec![
                Value::String(task.title.clone()),
                Value::String(task.description.clone()),
                Value::Integer(task.due_time.timestamp_millis()),
                Value::String(task.category.to_string()),
                Value::Integer(i64::from(task.is_completed)),
                Value::Integer(Utc::now().timestamp_millis()),
                Value::Integer(task.id),
            ],
        )?;
        statement.next()?;
        Ok(())
    }

    pub async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        let conn = self.lock()?;
        execute_with(&conn, "DELETE FROM tasks WHERE id = ?", vec![Value::Integer(task_id)])
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<Option<Task>> {
        let conn = self.lock()?;
        let mut tasks = query_tasks(
            &conn,
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
            vec![Value::Integer(task_id)],
        )?;
        Ok(tasks.pop())
    }

    /// All tasks, soonest due first
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        query_tasks(
            &conn,
            &format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY due_time ASC, id ASC"),
            vec![],
        )
    }

    pub async fn list_pending_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        query_tasks(
            &conn,
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE is_completed = 0 ORDER BY due_time ASC, id ASC"
            ),
            vec![],
        )
    }

    /// Completed tasks, most recently due first
    pub async fn list_completed_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        query_tasks(
            &conn,
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE is_completed = 1 ORDER BY due_time DESC, id DESC"
            ),
            vec![],
        )
    }

    pub async fn list_by_category(&self, category: Category) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        query_tasks(
            &conn,
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE category = ? ORDER BY due_time ASC, id ASC"
            ),
            vec![Value::String(category.to_string())],
        )
    }

    /// Tasks whose title or description contains `text`
    pub async fn search_tasks(&self, text: &str) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        query_tasks(
            &conn,
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE title LIKE '%' || ? || '%' OR description LIKE '%' || ? || '%'
                 ORDER BY due_time ASC, id ASC"
            ),
            vec![Value::String(text.to_string()), Value::String(text.to_string())],
        )
    }

    pub async fn pending_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let mut statement =
            conn.prepare("SELECT COUNT(*) AS total FROM tasks WHERE is_completed = 0")?;
        statement.next()?;
        Ok(statement.read::<i64, _>("total")?)
    }

    /// Pending tasks due within `[start, end]`
    pub async fn tasks_due_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        query_tasks(
            &conn,
            &format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE due_time BETWEEN ? AND ? AND is_completed = 0
                 ORDER BY due_time ASC, id ASC"
            ),
            vec![
                Value::Integer(start.timestamp_millis()),
                Value::Integer(end.timestamp_millis()),
            ],
        )
    }

    pub async fn mark_task_completed(&self, task_id: TaskId) -> Result<()> {
        let conn = self.lock()?;
        execute_with(
            &conn,
            "UPDATE tasks SET is_completed = 1, updated_at = ? WHERE id = ?",
            vec![
                Value::Integer(Utc::now().timestamp_millis()),
                Value::Integer(task_id),
            ],
        )
    }

    /// Delete every completed task, returning the ids that were removed
    pub async fn delete_completed_tasks(&self) -> Result<Vec<TaskId>> {
        let conn = self.lock()?;

        let mut ids = Vec::new();
        let mut statement = conn.prepare("SELECT id FROM tasks WHERE is_completed = 1")?;
        while let State::Row = statement.next()? {
            ids.push(statement.read::<i64, _>("id")?);
        }

        conn.execute("DELETE FROM tasks WHERE is_completed = 1")?;
        info!("Deleted {} completed task(s)", ids.len());
        Ok(ids)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow::anyhow!("Task database lock poisoned"))
    }
}

#[async_trait]
impl TaskStore for TaskDatabase {
    async fn get_by_id(&self, task_id: TaskId) -> Result<Option<Task>> {
        self.get_task(task_id).await
    }

    async fn list_pending(&self) -> Result<Vec<Task>> {
        self.list_pending_tasks().await
    }

    async fn mark_completed(&self, task_id: TaskId) -> Result<()> {
        self.mark_task_completed(task_id).await
    }
}

fn bind_all(statement: &mut Statement<'_>, params: Vec<Value>) -> Result<()> {
    for (index, value) in params.into_iter().enumerate() {
        statement.bind((index + 1, value))?;
    }
    Ok(())
}

fn execute_with(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<()> {
    let mut statement = conn.prepare(sql)?;
    bind_all(&mut statement, params)?;
    statement.next()?;
    Ok(())
}

fn query_tasks(conn: &Connection, sql: &str, params: Vec<Value>) -> Result<Vec<Task>> {
    let mut statement = conn.prepare(sql)?;
    bind_all(&mut statement, params)?;

    let mut tasks = Vec::new();
    while let State::Row = statement.next()? {
        tasks.push(read_task(&statement)?);
    }
    Ok(tasks)
}

fn read_task(statement: &Statement<'_>) -> Result<Task> {
    Ok(Task {
        id: statement.read::<i64, _>("id")?,
        title: statement.read::<String, _>("title")?,
        description: statement.read::<String, _>("description")?,
        due_time: from_millis(statement.read::<i64, _>("due_time")?)?,
        category: statement.read::<String, _>("category")?.parse()?,
        is_completed: statement.read::<i64, _>("is_completed")? != 0,
        created_at: from_millis(statement.read::<i64, _>("created_at")?)?,
        updated_at: from_millis(statement.read::<i64, _>("updated_at")?)?,
    })
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow::anyhow!("Timestamp out of range: {}", millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 10, 10, 0, 0).unwrap()
    }

    async fn db_with(tasks: Vec<Task>) -> (TaskDatabase, Vec<TaskId>) {
        let db = TaskDatabase::new(":memory:").await.unwrap();
        let mut ids = Vec::new();
        for task in tasks {
            ids.push(db.insert_task(&task).await.unwrap());
        }
        (db, ids)
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let task = Task::new("Dentist", t0() + Duration::hours(3))
            .with_description("Bring insurance card")
            .with_category(Category::Health);
        let (db, ids) = db_with(vec![task.clone()]).await;

        let stored = db.get_task(ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.id, ids[0]);
        assert_eq!(stored.title, "Dentist");
        assert_eq!(stored.description, "Bring insurance card");
        assert_eq!(stored.category, Category::Health);
        assert_eq!(stored.due_time, task.due_time);
        assert!(!stored.is_completed);

        assert!(db.get_task(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_assigned_in_order() {
        let (_db, ids) = db_with(vec![
            Task::new("A", t0()),
            Task::new("B", t0()),
            Task::new("C", t0()),
        ])
        .await;
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (db, ids) = db_with(vec![Task::new("Draft", t0() + Duration::hours(2))]).await;

        let mut task = db.get_task(ids[0]).await.unwrap().unwrap();
        task.title = "Final".to_string();
        task.due_time = t0() + Duration::hours(5);
        db.update_task(&task).await.unwrap();

        let stored = db.get_task(ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.title, "Final");
        assert_eq!(stored.due_time, t0() + Duration::hours(5));

        db.delete_task(ids[0]).await.unwrap();
        assert!(db.get_task(ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_and_filters() {
        let (db, ids) = db_with(vec![
            Task::new("Late report", t0() + Duration::hours(8)).with_category(Category::Work),
            Task::new("Early run", t0() + Duration::hours(1))
                .with_category(Category::Health)
                .with_description("Park loop"),
            Task::new("Old invoice", t0() - Duration::days(1))
                .with_category(Category::Work)
                .completed(),
        ])
        .await;

        let all: Vec<TaskId> = db.list_tasks().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(all, vec![ids[2], ids[1], ids[0]]);

        let pending: Vec<TaskId> = db
            .list_pending_tasks()
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(pending, vec![ids[1], ids[0]]);
        assert_eq!(db.pending_count().await.unwrap(), 2);

        let completed = db.list_completed_tasks().await.unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].is_completed);

        let work = db.list_by_category(Category::Work).await.unwrap();
        assert_eq!(work.len(), 2);

        let found = db.search_tasks("park").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ids[1]);
        assert_eq!(db.search_tasks("report").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tasks_due_between_skips_completed() {
        let (db, ids) = db_with(vec![
            Task::new("Soon", t0() + Duration::minutes(30)),
            Task::new("Soon but done", t0() + Duration::minutes(40)).completed(),
            Task::new("Later", t0() + Duration::hours(3)),
        ])
        .await;

        let due = db
            .tasks_due_between(t0(), t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_mark_completed_and_purge() {
        let (db, ids) = db_with(vec![
            Task::new("One", t0() + Duration::hours(2)),
            Task::new("Two", t0() + Duration::hours(3)),
            Task::new("Three", t0() + Duration::hours(4)),
        ])
        .await;

        db.mark_task_completed(ids[0]).await.unwrap();
        db.mark_task_completed(ids[2]).await.unwrap();
        assert!(db.get_task(ids[0]).await.unwrap().unwrap().is_completed);

        let mut purged = db.delete_completed_tasks().await.unwrap();
        purged.sort();
        assert_eq!(purged, vec![ids[0], ids[2]]);

        let left: Vec<TaskId> = db.list_tasks().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(left, vec![ids[1]]);
        assert!(db.delete_completed_tasks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_task_store_impl() {
        let (db, ids) = db_with(vec![
            Task::new("Pending", t0() + Duration::hours(2)),
            Task::new("Done", t0() + Duration::hours(1)).completed(),
        ])
        .await;
        let store: &dyn TaskStore = &db;

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ids[0]);

        store.mark_completed(ids[0]).await.unwrap();
        assert!(store.get_by_id(ids[0]).await.unwrap().unwrap().is_completed);
        assert!(store.list_pending().await.unwrap().is_empty());
    }
}
