use anyhow::Result;

use feedhub_core::aggregate::Aggregator;
use feedhub_core::provider::ProviderTag;
use feedhub_core::scheduler::aggregate_all_feeds;
use feedhub_core::storage::Database;
use feedhub_core::AppConfig;

pub async fn run(
    db: &Database,
    config: &AppConfig,
    user_id: i64,
    feed_id: Option<i64>,
    providers: &[ProviderTag],
) -> Result<()> {
    let Some(feed_id) = feed_id else {
        println!("Aggregating all feeds...\n");
        let new_articles = aggregate_all_feeds(db, config).await?;
        println!("\nDone. {} new articles linked.", new_articles);
        return Ok(());
    };

    let providers: Vec<ProviderTag> = if providers.is_empty() {
        ProviderTag::ALL.to_vec()
    } else {
        providers.to_vec()
    };

    println!("Aggregating feed {}...", feed_id);

    let aggregator = Aggregator::new(db, config);
    let outcome = aggregator.aggregate_feed(feed_id, user_id, &providers).await?;

    println!("Linked {} new articles.", outcome.added.len());
    for article in &outcome.added {
        println!("  [{}] {}", article.provider, article.title);
    }

    for failure in &outcome.failed {
        println!(
            "Provider {} failed: {}",
            failure.provider, failure.message
        );
    }

    Ok(())
}
