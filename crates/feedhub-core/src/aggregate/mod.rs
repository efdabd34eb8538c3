//! Aggregation orchestrator: fetch from providers, normalize, upsert,
//! link into the requested feed.
//!
//! Provider failures are isolated per provider and reported in the
//! outcome; partial success is the normal case, not an error state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::model::Article;
use crate::normalize::normalize;
use crate::provider::{ProviderClient, ProviderTag, RawArticle};
use crate::storage::{ArticleRepository, Database, FeedArticleRepository, FeedRepository};
use crate::{Error, Result};

/// One provider that could not be reached during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: ProviderTag,
    pub message: String,
}

/// Result of a single aggregation run
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AggregateOutcome {
    /// Articles newly linked into the feed by this call
    pub added: Vec<Article>,
    /// Providers that failed; the others' results still count
    pub failed: Vec<ProviderFailure>,
}

/// Coordinates fetch → normalize → upsert → link for one feed
pub struct Aggregator<'a> {
    db: &'a Database,
    config: &'a AppConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(db: &'a Database, config: &'a AppConfig) -> Self {
        Self { db, config }
    }

    /// Aggregate the requested providers into a feed owned by
    /// `owner_id`.
    ///
    /// Providers are fetched concurrently, each bounded by the
    /// configured per-provider timeout. No retry loop here: a failed
    /// provider lands in the outcome and a later run picks it up.
    pub async fn aggregate_feed(
        &self,
        feed_id: i64,
        owner_id: i64,
        providers: &[ProviderTag],
    ) -> Result<AggregateOutcome> {
        let feed_repo = FeedRepository::new(self.db);
        let feed = feed_repo
            .find_by_id(feed_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("feed {}", feed_id)))?;
        if feed.user_id != owner_id {
            return Err(Error::Forbidden(format!(
                "feed {} does not belong to user {}",
                feed_id, owner_id
            )));
        }

        let client = Arc::new(ProviderClient::new(self.config)?);
        let deadline = Duration::from_secs(self.config.sync.provider_timeout_secs);

        let mut fetches: JoinSet<(ProviderTag, Result<Vec<RawArticle>>)> = JoinSet::new();
        for &tag in providers {
            let client = Arc::clone(&client);
            fetches.spawn(async move {
                let result = match tokio::time::timeout(deadline, client.fetch_all(tag)).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::ProviderUnavailable {
                        provider: tag,
                        message: format!("fetch timed out after {:?}", deadline),
                    }),
                };
                (tag, result)
            });
        }

        let mut outcome = AggregateOutcome::default();
        let mut any_success = false;

        while let Some(joined) = fetches.join_next().await {
            let (tag, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Provider fetch task failed to join");
                    continue;
                }
            };

            match result {
                Ok(records) => {
                    let added = self.ingest(feed_id, tag, records).await?;
                    info!(
                        provider = %tag,
                        feed_id,
                        added = added.len(),
                        "Provider aggregated"
                    );
                    outcome.added.extend(added);
                    any_success = true;
                }
                Err(e) => {
                    warn!(provider = %tag, feed_id, error = %e, "Provider failed");
                    outcome.failed.push(ProviderFailure {
                        provider: tag,
                        message: e.to_string(),
                    });
                }
            }
        }

        if any_success {
            feed_repo.touch_fetched(feed_id).await?;
        }

        Ok(outcome)
    }

    /// Normalize, upsert and link one provider's records.
    ///
    /// Malformed records are skipped with a warning; storage errors
    /// abort the run. Returns the articles whose feed link was newly
    /// created by this call.
    pub async fn ingest(
        &self,
        feed_id: i64,
        tag: ProviderTag,
        records: Vec<RawArticle>,
    ) -> Result<Vec<Article>> {
        let article_repo = ArticleRepository::new(self.db);
        let link_repo = FeedArticleRepository::new(self.db);
        let refresh = self.config.sync.refresh_existing;

        let mut added = Vec::new();

        for record in records {
            let new_article = match normalize(&record, tag) {
                Ok(article) => article,
                Err(Error::MalformedRecord(reason)) => {
                    warn!(provider = %tag, %reason, "Skipping malformed record");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let (article, created) = article_repo.upsert(&new_article, refresh).await?;
            if created {
                debug!(provider = %tag, external_id = %article.external_id, "New article stored");
            }

            if link_repo.link(feed_id, article.id).await? {
                added.push(article);
            }
        }

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewFeed, NewUser};
    use crate::storage::UserRepository;
    use chrono::{TimeZone, Utc};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::new_in_memory().await.unwrap();
        let user = UserRepository::new(&db)
            .create(&NewUser {
                email: "alice@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                user_id: user.id,
                title: "My feed".to_string(),
                url: None,
                site_url: None,
                description: None,
            })
            .await
            .unwrap();
        (db, user.id, feed.id)
    }

    fn raw(external_id: &str, title: Option<&str>, day: u32) -> RawArticle {
        RawArticle {
            external_id: Some(external_id.to_string()),
            title: title.map(String::from),
            url: Some(format!("https://example.com/{}", external_id)),
            published_at: Some(Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    fn unreachable_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.sync.request_timeout_secs = 2;
        config.sync.provider_timeout_secs = 5;
        config.qiita.base_url = "http://127.0.0.1:1".to_string();
        config.hatena.feed_url = "http://127.0.0.1:1/feed".to_string();
        config
    }

    #[tokio::test]
    async fn test_ingest_links_all_new_records() {
        let config = AppConfig::default();
        let (db, _, feed_id) = setup().await;
        let aggregator = Aggregator::new(&db, &config);

        let records = vec![
            raw("a1", Some("One"), 1),
            raw("a2", Some("Two"), 2),
            raw("a3", Some("Three"), 3),
        ];
        let added = aggregator
            .ingest(feed_id, ProviderTag::Qiita, records)
            .await
            .unwrap();
        assert_eq!(added.len(), 3);
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let config = AppConfig::default();
        let (db, _, feed_id) = setup().await;
        let aggregator = Aggregator::new(&db, &config);

        let records = || vec![raw("a1", Some("One"), 1), raw("a2", Some("Two"), 2)];

        let first = aggregator
            .ingest(feed_id, ProviderTag::Qiita, records())
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let second = aggregator
            .ingest(feed_id, ProviderTag::Qiita, records())
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_refetch_links_only_new() {
        let config = AppConfig::default();
        let (db, _, feed_id) = setup().await;
        let aggregator = Aggregator::new(&db, &config);

        let first = aggregator
            .ingest(
                feed_id,
                ProviderTag::Qiita,
                vec![
                    raw("a1", Some("One"), 1),
                    raw("a2", Some("Two"), 2),
                    raw("a3", Some("Three"), 3),
                ],
            )
            .await
            .unwrap();
        assert_eq!(first.len(), 3);

        // The provider now returns a2, a3 and the new a4
        let second = aggregator
            .ingest(
                feed_id,
                ProviderTag::Qiita,
                vec![
                    raw("a2", Some("Two"), 2),
                    raw("a3", Some("Three"), 3),
                    raw("a4", Some("Four"), 4),
                ],
            )
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].external_id, "a4");

        // No duplicate article rows were created along the way
        assert_eq!(ArticleRepository::new(&db).count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_malformed_record_skipped_others_processed() {
        let config = AppConfig::default();
        let (db, _, feed_id) = setup().await;
        let aggregator = Aggregator::new(&db, &config);

        let records = vec![
            raw("h1", Some("Good"), 1),
            raw("h2", None, 2), // no title
            raw("h3", Some("Also good"), 3),
        ];
        let added = aggregator
            .ingest(feed_id, ProviderTag::Hatena, records)
            .await
            .unwrap();

        let ids: Vec<_> = added.iter().map(|a| a.external_id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"h1"));
        assert!(ids.contains(&"h3"));
    }

    #[tokio::test]
    async fn test_concurrent_ingest_of_same_feed_links_once() {
        let db = Database::new_in_temp_file().await.unwrap();
        let user = UserRepository::new(&db)
            .create(&NewUser {
                email: "alice@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        let feed_id = FeedRepository::new(&db)
            .create(&NewFeed {
                user_id: user.id,
                title: "My feed".to_string(),
                url: None,
                site_url: None,
                description: None,
            })
            .await
            .unwrap()
            .id;

        // Two requests aggregate the same feed at the same time
        let spawn_ingest = |db: Database, config: AppConfig| {
            tokio::spawn(async move {
                Aggregator::new(&db, &config)
                    .ingest(feed_id, ProviderTag::Qiita, vec![raw("r1", Some("Racy"), 1)])
                    .await
            })
        };
        let left = spawn_ingest(db.clone(), AppConfig::default());
        let right = spawn_ingest(db.clone(), AppConfig::default());

        let added_left = left.await.unwrap().unwrap();
        let added_right = right.await.unwrap().unwrap();

        // One article row, one link, reported as added exactly once
        assert_eq!(added_left.len() + added_right.len(), 1);
        assert_eq!(ArticleRepository::new(&db).count().await.unwrap(), 1);
        assert_eq!(
            FeedArticleRepository::new(&db)
                .count_for_feed(feed_id)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_shared_article_linked_into_second_feed() {
        let config = AppConfig::default();
        let (db, user_id, feed_a) = setup().await;
        let feed_b = FeedRepository::new(&db)
            .create(&NewFeed {
                user_id,
                title: "Other feed".to_string(),
                url: None,
                site_url: None,
                description: None,
            })
            .await
            .unwrap()
            .id;
        let aggregator = Aggregator::new(&db, &config);

        aggregator
            .ingest(feed_a, ProviderTag::Qiita, vec![raw("a1", Some("One"), 1)])
            .await
            .unwrap();
        let added = aggregator
            .ingest(feed_b, ProviderTag::Qiita, vec![raw("a1", Some("One"), 1)])
            .await
            .unwrap();

        // Same underlying row, linked into the second feed as new
        assert_eq!(added.len(), 1);
        assert_eq!(ArticleRepository::new(&db).count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_feed_is_not_found() {
        let config = AppConfig::default();
        let (db, user_id, _) = setup().await;
        let aggregator = Aggregator::new(&db, &config);

        let err = aggregator
            .aggregate_feed(9999, user_id, &[ProviderTag::Qiita])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_foreign_feed_is_forbidden() {
        let config = AppConfig::default();
        let (db, _, feed_id) = setup().await;
        let mallory = UserRepository::new(&db)
            .create(&NewUser {
                email: "mallory@example.com".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        let aggregator = Aggregator::new(&db, &config);

        let err = aggregator
            .aggregate_feed(feed_id, mallory.id, &[ProviderTag::Qiita])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_reported_not_fatal() {
        let config = unreachable_config();
        let (db, user_id, feed_id) = setup().await;
        let aggregator = Aggregator::new(&db, &config);

        let outcome = aggregator
            .aggregate_feed(feed_id, user_id, &[ProviderTag::Hatena])
            .await
            .unwrap();

        assert!(outcome.added.is_empty());
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].provider, ProviderTag::Hatena);
    }

    #[tokio::test]
    async fn test_each_failing_provider_reported_separately() {
        let config = unreachable_config();
        let (db, user_id, feed_id) = setup().await;
        let aggregator = Aggregator::new(&db, &config);

        let outcome = aggregator
            .aggregate_feed(feed_id, user_id, &ProviderTag::ALL)
            .await
            .unwrap();

        assert_eq!(outcome.failed.len(), 2);
        let mut tags: Vec<_> = outcome.failed.iter().map(|f| f.provider).collect();
        tags.sort_by_key(|t| t.as_str());
        assert_eq!(tags, vec![ProviderTag::Hatena, ProviderTag::Qiita]);

        // A run with no successful provider leaves the feed unstamped
        let feed = FeedRepository::new(&db)
            .find_by_id(feed_id)
            .await
            .unwrap()
            .unwrap();
        assert!(feed.last_fetched_at.is_none());
    }
}
