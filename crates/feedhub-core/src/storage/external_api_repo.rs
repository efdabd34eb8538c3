use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::model::{ExternalApi, NewExternalApi};
use crate::{Error, Result};

/// Repository for user-registered external API endpoints.
///
/// These registrations are plain records; they are independent of the
/// two built-in aggregation providers.
pub struct ExternalApiRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct ExternalApiRow {
    id: i64,
    user_id: i64,
    name: String,
    base_url: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ExternalApiRow> for ExternalApi {
    fn from(row: ExternalApiRow) -> Self {
        ExternalApi {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            base_url: row.base_url,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const API_COLUMNS: &str = "id, user_id, name, base_url, description, created_at, updated_at";

impl<'a> ExternalApiRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, new_api: &NewExternalApi) -> Result<ExternalApi> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO external_apis (user_id, name, base_url, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_api.user_id)
        .bind(&new_api.name)
        .bind(&new_api.base_url)
        .bind(&new_api.description)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        self.find_for_owner(new_api.user_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("external api {}", id)))
    }

    pub async fn find_for_owner(&self, user_id: i64, api_id: i64) -> Result<Option<ExternalApi>> {
        let row: Option<ExternalApiRow> = sqlx::query_as(&format!(
            "SELECT {} FROM external_apis WHERE id = ? AND user_id = ?",
            API_COLUMNS
        ))
        .bind(api_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(ExternalApi::from))
    }

    pub async fn list_by_owner(&self, user_id: i64) -> Result<Vec<ExternalApi>> {
        let rows: Vec<ExternalApiRow> = sqlx::query_as(&format!(
            "SELECT {} FROM external_apis WHERE user_id = ? ORDER BY created_at, id",
            API_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(ExternalApi::from).collect())
    }

    pub async fn update(&self, user_id: i64, api_id: i64, api: &NewExternalApi) -> Result<ExternalApi> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE external_apis
            SET name = ?, base_url = ?, description = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&api.name)
        .bind(&api.base_url)
        .bind(&api.description)
        .bind(now)
        .bind(api_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() < 1 {
            return Err(Error::NotFound(format!("external api {}", api_id)));
        }

        self.find_for_owner(user_id, api_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("external api {}", api_id)))
    }

    pub async fn delete(&self, user_id: i64, api_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM external_apis WHERE id = ? AND user_id = ?")
            .bind(api_id)
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
    async fn test_registration_lifecycle() {
        let db = Database::new_in_memory().await.unwrap();
        let user = UserRepository::new(&db)
            .create(&NewUser {
                email: "alice@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        let repo = ExternalApiRepository::new(&db);
        let api = repo
            .create(&NewExternalApi {
                user_id: user.id,
                name: "weather".to_string(),
                base_url: "https://api.example.com/v1".to_string(),
                description: Some("Weather data".to_string()),
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                user.id,
                api.id,
                &NewExternalApi {
                    user_id: user.id,
                    name: "weather-v2".to_string(),
                    base_url: "https://api.example.com/v2".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "weather-v2");

        assert!(repo.delete(user.id, api.id).await.unwrap());
        assert!(repo.list_by_owner(user.id).await.unwrap().is_empty());
    }
}
