use super::Database;
use crate::model::{Article, Pagination};
use crate::Result;

/// Repository for the many-to-many relation between feeds and
/// articles.
///
/// The (feed_id, article_id) primary key keeps the relation free of
/// duplicates; linking an already linked pair is an idempotent no-op
/// and unlinking never touches the article row itself.
pub struct FeedArticleRepository<'a> {
    db: &'a Database,
}

impl<'a> FeedArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Link an article into a feed. Returns whether the link was
    /// newly created (false means it already existed).
    pub async fn link(&self, feed_id: i64, article_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO feed_articles (feed_id, article_id) VALUES (?, ?)",
        )
        .bind(feed_id)
        .bind(article_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove an article from a feed. Returns whether a link existed.
    pub async fn unlink(&self, feed_id: i64, article_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feed_articles WHERE feed_id = ? AND article_id = ?")
            .bind(feed_id)
            .bind(article_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Articles linked into a feed, newest published first
    pub async fn list_for_feed(&self, feed_id: i64, page: Pagination) -> Result<Vec<Article>> {
        let rows: Vec<super::article_repo::ArticleRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.provider, a.external_id, a.title, a.url, a.author, a.summary,
                   a.content, a.content_text, a.categories, a.published_at, a.fetched_at,
                   a.created_at
            FROM articles a
            JOIN feed_articles fa ON fa.article_id = a.id
            WHERE fa.feed_id = ?
            ORDER BY a.published_at DESC, a.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(feed_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Number of articles linked into a feed
    pub async fn count_for_feed(&self, feed_id: i64) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feed_articles WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewArticle, NewFeed, NewUser};
    use crate::provider::ProviderTag;
    use crate::storage::{ArticleRepository, FeedRepository, UserRepository};
    use chrono::{TimeZone, Utc};

    async fn setup(db: &Database) -> (i64, i64) {
        let user = UserRepository::new(db)
            .create(&NewUser {
                email: "alice@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();

        let feeds = FeedRepository::new(db);
        let a = feeds
            .create(&NewFeed {
                user_id: user.id,
                title: "Feed A".to_string(),
                url: None,
                site_url: None,
                description: None,
            })
            .await
            .unwrap();
        let b = feeds
            .create(&NewFeed {
                user_id: user.id,
                title: "Feed B".to_string(),
                url: None,
                site_url: None,
                description: None,
            })
            .await
            .unwrap();

        (a.id, b.id)
    }

    async fn article(db: &Database, external_id: &str, day: u32) -> i64 {
        let (article, _) = ArticleRepository::new(db)
            .upsert(
                &NewArticle {
                    provider: ProviderTag::Qiita,
                    external_id: external_id.to_string(),
                    title: format!("Article {}", external_id),
                    url: None,
                    author: None,
                    summary: None,
                    content: None,
                    content_text: None,
                    categories: Vec::new(),
                    published_at: Some(Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap()),
                },
                true,
            )
            .await
            .unwrap();
        article.id
    }

    #[tokio::test]
    async fn test_link_is_idempotent() {
        let db = Database::new_in_memory().await.unwrap();
        let (feed_a, _) = setup(&db).await;
        let id = article(&db, "a1", 1).await;

        let repo = FeedArticleRepository::new(&db);
        assert!(repo.link(feed_a, id).await.unwrap());
        assert!(!repo.link(feed_a, id).await.unwrap());
        assert_eq!(repo.count_for_feed(feed_a).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unlink_keeps_article_row() {
        let db = Database::new_in_memory().await.unwrap();
        let (feed_a, feed_b) = setup(&db).await;
        let id = article(&db, "a1", 1).await;

        let repo = FeedArticleRepository::new(&db);
        repo.link(feed_a, id).await.unwrap();
        repo.link(feed_b, id).await.unwrap();

        assert!(repo.unlink(feed_a, id).await.unwrap());
        // The article is still linked elsewhere and its row survives
        assert_eq!(repo.count_for_feed(feed_b).await.unwrap(), 1);
        let articles = ArticleRepository::new(&db);
        assert!(articles.find_by_id(id).await.unwrap().is_some());

        // Unlinking again reports that no link existed
        assert!(!repo.unlink(feed_a, id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_with_pagination() {
        let db = Database::new_in_memory().await.unwrap();
        let (feed_a, _) = setup(&db).await;
        let repo = FeedArticleRepository::new(&db);

        for (ext, day) in [("a1", 1), ("a2", 3), ("a3", 2)] {
            let id = article(&db, ext, day).await;
            repo.link(feed_a, id).await.unwrap();
        }

        let all = repo
            .list_for_feed(feed_a, Pagination::default())
            .await
            .unwrap();
        let ids: Vec<_> = all.iter().map(|a| a.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a3", "a1"]);

        let window = repo
            .list_for_feed(
                feed_a,
                Pagination {
                    limit: 1,
                    offset: 1,
                },
            )
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].external_id, "a3");
    }
}
