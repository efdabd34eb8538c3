use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::model::{NewTask, Task};
use crate::{Error, Result};

/// Repository for owner-scoped task CRUD
pub struct TaskRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct TaskRow {
    id: i64,
    user_id: i64,
    title: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> TaskRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, new_task: &NewTask) -> Result<Task> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO tasks (user_id, title, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(new_task.user_id)
        .bind(&new_task.title)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        self.find_for_owner(new_task.user_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))
    }

    pub async fn find_for_owner(&self, user_id: i64, task_id: i64) -> Result<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            "SELECT id, user_id, title, created_at, updated_at FROM tasks \
             WHERE id = ? AND user_id = ?",
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Task::from))
    }

    pub async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id, user_id, title, created_at, updated_at FROM tasks \
             WHERE user_id = ? ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    pub async fn update(&self, user_id: i64, task_id: i64, title: &str) -> Result<Task> {
        let now = Utc::now();

        let result =
            sqlx::query("UPDATE tasks SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?")
                .bind(title)
                .bind(now)
                .bind(task_id)
                .bind(user_id)
                .execute(self.db.pool())
                .await?;

        if result.rows_affected() < 1 {
            return Err(Error::NotFound(format!("task {}", task_id)));
        }

        self.find_for_owner(user_id, task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))
    }

    pub async fn delete(&self, user_id: i64, task_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
            .bind(task_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewUser;
    use crate::storage::UserRepository;

    #[tokio::test]
    async fn test_task_lifecycle() {
        let db = Database::new_in_memory().await.unwrap();
        let user = UserRepository::new(&db)
            .create(&NewUser {
                email: "alice@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        let repo = TaskRepository::new(&db);
        let task = repo
            .create(&NewTask {
                user_id: user.id,
                title: "Write report".to_string(),
            })
            .await
            .unwrap();

        let updated = repo.update(user.id, task.id, "Write report v2").await.unwrap();
        assert_eq!(updated.title, "Write report v2");

        assert_eq!(repo.list_by_owner(user.id).await.unwrap().len(), 1);
        assert!(repo.delete(user.id, task.id).await.unwrap());
        assert!(repo.list_by_owner(user.id).await.unwrap().is_empty());
    }
}
