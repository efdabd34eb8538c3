use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::model::{Feed, FeedUpdate, NewFeed};
use crate::{Error, Result};

/// Repository for owner-scoped feed CRUD
pub struct FeedRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct FeedRow {
    id: i64,
    user_id: i64,
    title: String,
    url: Option<String>,
    site_url: Option<String>,
    description: Option<String>,
    last_fetched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            url: row.url,
            site_url: row.site_url,
            description: row.description,
            last_fetched_at: row.last_fetched_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const FEED_COLUMNS: &str =
    "id, user_id, title, url, site_url, description, last_fetched_at, created_at, updated_at";

impl<'a> FeedRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a new feed for its owner
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO feeds (user_id, title, url, site_url, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_feed.user_id)
        .bind(&new_feed.title)
        .bind(&new_feed.url)
        .bind(&new_feed.site_url)
        .bind(&new_feed.description)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let id = result.last_insert_rowid();
        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("feed {}", id)))
    }

    /// Find a feed by id, regardless of owner.
    /// The caller is responsible for the ownership check.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE id = ?", FEED_COLUMNS))
                .bind(id)
                .fetch_optional(self.db.pool())
                .await?;

        Ok(row.map(Feed::from))
    }

    /// Find a feed by id, scoped to its owner
    pub async fn find_for_owner(&self, user_id: i64, feed_id: i64) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM feeds WHERE id = ? AND user_id = ?",
            FEED_COLUMNS
        ))
        .bind(feed_id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// List a user's feeds, oldest first
    pub async fn list_by_owner(&self, user_id: i64) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM feeds WHERE user_id = ? ORDER BY created_at, id",
            FEED_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Update a feed's mutable fields, scoped to its owner
    pub async fn update(&self, user_id: i64, feed_id: i64, update: &FeedUpdate) -> Result<Feed> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET title = ?, url = ?, site_url = ?, description = ?, updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&update.title)
        .bind(&update.url)
        .bind(&update.site_url)
        .bind(&update.description)
        .bind(now)
        .bind(feed_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() < 1 {
            return Err(Error::NotFound(format!("feed {}", feed_id)));
        }

        self.find_by_id(feed_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("feed {}", feed_id)))
    }

    /// Delete a feed (and, via cascade, its article links)
    pub async fn delete(&self, user_id: i64, feed_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ? AND user_id = ?")
            .bind(feed_id)
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Stamp the feed after a successful aggregation run
    pub async fn touch_fetched(&self, feed_id: i64) -> Result<()> {
        let now = Utc::now();

        sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(feed_id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewUser;
    use crate::storage::UserRepository;

    async fn user(db: &Database, email: &str) -> i64 {
        UserRepository::new(db)
            .create(&NewUser {
                email: email.to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_crud_is_owner_scoped() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = FeedRepository::new(&db);
        let alice = user(&db, "alice@example.com").await;
        let mallory = user(&db, "mallory@example.com").await;

        let feed = repo
            .create(&NewFeed {
                user_id: alice,
                title: "TechCrunch".to_string(),
                url: Some("https://techcrunch.com/feed".to_string()),
                site_url: None,
                description: None,
            })
            .await
            .unwrap();

        assert!(repo.find_for_owner(alice, feed.id).await.unwrap().is_some());
        assert!(repo
            .find_for_owner(mallory, feed.id)
            .await
            .unwrap()
            .is_none());

        let update = FeedUpdate {
            title: "Renamed".to_string(),
            url: feed.url.clone(),
            site_url: None,
            description: None,
        };
        let err = repo.update(mallory, feed.id, &update).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let updated = repo.update(alice, feed.id, &update).await.unwrap();
        assert_eq!(updated.title, "Renamed");

        assert!(!repo.delete(mallory, feed.id).await.unwrap());
        assert!(repo.delete(alice, feed.id).await.unwrap());
        assert!(repo.find_by_id(feed.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_fetched_sets_timestamp() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = FeedRepository::new(&db);
        let alice = user(&db, "alice@example.com").await;

        let feed = repo
            .create(&NewFeed {
                user_id: alice,
                title: "Feed".to_string(),
                url: None,
                site_url: None,
                description: None,
            })
            .await
            .unwrap();
        assert!(feed.last_fetched_at.is_none());

        repo.touch_fetched(feed.id).await.unwrap();
        let feed = repo.find_by_id(feed.id).await.unwrap().unwrap();
        assert!(feed.last_fetched_at.is_some());
    }
}
