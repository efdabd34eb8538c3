use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::database::is_unique_violation;
use super::Database;
use crate::model::{NewUser, User};
use crate::{Error, Result};

/// Repository for user accounts
pub struct UserRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password: row.password,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a user account; the email must be unused
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (email, password, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&new_user.email)
        .bind(&new_user.password)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Other(format!("email already registered: {}", new_user.email))
            } else {
                e.into()
            }
        })?;

        let id = result.last_insert_rowid();
        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", id)))
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, password, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(User::from))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, password, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(User::from))
    }

    /// All registered users, used by the background scheduler
    pub async fn list_all(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, email, password, created_at, updated_at FROM users ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = UserRepository::new(&db);

        let new_user = NewUser {
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
        };

        repo.create(&new_user).await.unwrap();
        let err = repo.create(&new_user).await.unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = UserRepository::new(&db);

        repo.create(&NewUser {
            email: "alice@example.com".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();

        let found = repo.find_by_email("alice@example.com").await.unwrap();
        assert!(found.is_some());
        assert!(repo.find_by_email("bob@example.com").await.unwrap().is_none());
    }
}
