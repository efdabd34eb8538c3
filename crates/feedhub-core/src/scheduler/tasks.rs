use crate::aggregate::Aggregator;
use crate::config::AppConfig;
use crate::provider::ProviderTag;
use crate::storage::{Database, FeedRepository, UserRepository};
use crate::Result;

/// Re-aggregate every feed of every user from both providers.
///
/// Per-feed failures are logged and do not stop the sweep; the count
/// of newly linked articles across all feeds is returned.
pub async fn aggregate_all_feeds(db: &Database, config: &AppConfig) -> Result<u32> {
    let user_repo = UserRepository::new(db);
    let feed_repo = FeedRepository::new(db);
    let aggregator = Aggregator::new(db, config);

    let mut total_added = 0u32;

    for user in user_repo.list_all().await? {
        for feed in feed_repo.list_by_owner(user.id).await? {
            match aggregator
                .aggregate_feed(feed.id, user.id, &ProviderTag::ALL)
                .await
            {
                Ok(outcome) => {
                    total_added += outcome.added.len() as u32;
                    for failure in &outcome.failed {
                        tracing::warn!(
                            feed_id = feed.id,
                            provider = %failure.provider,
                            message = %failure.message,
                            "Provider failed during scheduled aggregation"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(feed_id = feed.id, error = %e, "Scheduled aggregation failed");
                }
            }
        }
    }

    Ok(total_added)
}
