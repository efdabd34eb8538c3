use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::Database;
use crate::model::{Article, NewArticle};
use crate::provider::ProviderTag;
use crate::{Error, Result};

/// Repository for shared article rows.
///
/// Articles are keyed by (provider, external_id); the table's unique
/// constraint on that pair is the authoritative guard against
/// concurrent duplicate inserts.
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
pub(crate) struct ArticleRow {
    id: i64,
    provider: String,
    external_id: String,
    title: String,
    url: Option<String>,
    author: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    content_text: Option<String>,
    categories: Option<String>,
    published_at: Option<DateTime<Utc>>,
    fetched_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        let categories = row
            .categories
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        Article {
            id: row.id,
            provider: row.provider.parse().unwrap_or_default(),
            external_id: row.external_id,
            title: row.title,
            url: row.url,
            author: row.author,
            summary: row.summary,
            content: row.content,
            content_text: row.content_text,
            categories,
            published_at: row.published_at,
            fetched_at: row.fetched_at,
            created_at: row.created_at,
        }
    }
}

const ARTICLE_COLUMNS: &str = "id, provider, external_id, title, url, author, summary, \
     content, content_text, categories, published_at, fetched_at, created_at";

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert an article or reuse the existing row with the same
    /// (provider, external_id) key.
    ///
    /// Returns the stored article and whether this call created it.
    /// A lost insert race just means another run got there first; the
    /// row is re-read instead of surfacing the constraint error. With
    /// `refresh_existing` the mutable fields are updated from the new
    /// fetch, otherwise the first write wins.
    pub async fn upsert(
        &self,
        new_article: &NewArticle,
        refresh_existing: bool,
    ) -> Result<(Article, bool)> {
        let now = Utc::now();
        let categories = serde_json::to_string(&new_article.categories)?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles
            (provider, external_id, title, url, author, summary, content, content_text,
             categories, published_at, fetched_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new_article.provider.as_str())
        .bind(&new_article.external_id)
        .bind(&new_article.title)
        .bind(&new_article.url)
        .bind(&new_article.author)
        .bind(&new_article.summary)
        .bind(&new_article.content)
        .bind(&new_article.content_text)
        .bind(&categories)
        .bind(new_article.published_at)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let created = result.rows_affected() > 0;

        if !created {
            if refresh_existing {
                sqlx::query(
                    r#"
                    UPDATE articles
                    SET title = ?,
                        url = COALESCE(?, url),
                        author = COALESCE(?, author),
                        summary = COALESCE(?, summary),
                        content = COALESCE(?, content),
                        content_text = COALESCE(?, content_text),
                        categories = ?,
                        published_at = COALESCE(?, published_at),
                        fetched_at = ?
                    WHERE provider = ? AND external_id = ?
                    "#,
                )
                .bind(&new_article.title)
                .bind(&new_article.url)
                .bind(&new_article.author)
                .bind(&new_article.summary)
                .bind(&new_article.content)
                .bind(&new_article.content_text)
                .bind(&categories)
                .bind(new_article.published_at)
                .bind(now)
                .bind(new_article.provider.as_str())
                .bind(&new_article.external_id)
                .execute(self.db.pool())
                .await?;
            } else {
                sqlx::query(
                    "UPDATE articles SET fetched_at = ? WHERE provider = ? AND external_id = ?",
                )
                .bind(now)
                .bind(new_article.provider.as_str())
                .bind(&new_article.external_id)
                .execute(self.db.pool())
                .await?;
            }
        }

        let article = self
            .find_by_key(new_article.provider, &new_article.external_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "article ({}, {})",
                    new_article.provider, new_article.external_id
                ))
            })?;

        Ok((article, created))
    }

    /// Find an article by its numeric id
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Article::from))
    }

    /// Find an article by its provider key
    pub async fn find_by_key(
        &self,
        provider: ProviderTag,
        external_id: &str,
    ) -> Result<Option<Article>> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM articles WHERE provider = ? AND external_id = ?",
            ARTICLE_COLUMNS
        ))
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Article::from))
    }

    /// Total article count
    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(external_id: &str, title: &str) -> NewArticle {
        NewArticle {
            provider: ProviderTag::Qiita,
            external_id: external_id.to_string(),
            title: title.to_string(),
            url: Some(format!("https://example.com/{}", external_id)),
            author: None,
            summary: None,
            content: None,
            content_text: None,
            categories: vec!["tech".to_string()],
            published_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_reuse() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);

        let (first, created) = repo.upsert(&sample("a1", "Original"), true).await.unwrap();
        assert!(created);

        let (second, created) = repo.upsert(&sample("a1", "Renamed"), true).await.unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "Renamed");
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_first_write_wins_without_refresh() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);

        repo.upsert(&sample("a1", "Original"), false).await.unwrap();
        let (article, created) = repo.upsert(&sample("a1", "Renamed"), false).await.unwrap();

        assert!(!created);
        assert_eq!(article.title, "Original");
    }

    #[tokio::test]
    async fn test_same_external_id_different_provider_is_distinct() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);

        let mut hatena = sample("a1", "From hatena");
        hatena.provider = ProviderTag::Hatena;

        let (_, created_a) = repo.upsert(&sample("a1", "From qiita"), true).await.unwrap();
        let (_, created_b) = repo.upsert(&hatena, true).await.unwrap();

        assert!(created_a);
        assert!(created_b);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_upsert_yields_single_row() {
        let db = Database::new_in_temp_file().await.unwrap();

        let left = {
            let db = db.clone();
            tokio::spawn(async move {
                ArticleRepository::new(&db)
                    .upsert(&sample("race", "Racing"), true)
                    .await
            })
        };
        let right = {
            let db = db.clone();
            tokio::spawn(async move {
                ArticleRepository::new(&db)
                    .upsert(&sample("race", "Racing"), true)
                    .await
            })
        };

        let (a, created_a) = left.await.unwrap().unwrap();
        let (b, created_b) = right.await.unwrap().unwrap();

        // Whoever lost the race adopted the winner's row
        assert_eq!(a.id, b.id);
        assert!(created_a != created_b);
        assert_eq!(ArticleRepository::new(&db).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_categories_round_trip() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);

        let (article, _) = repo.upsert(&sample("a1", "Tagged"), true).await.unwrap();
        assert_eq!(article.categories, vec!["tech".to_string()]);

        let reread = repo.find_by_id(article.id).await.unwrap().unwrap();
        assert_eq!(reread.categories, vec!["tech".to_string()]);
    }
}
