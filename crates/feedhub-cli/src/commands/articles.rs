use anyhow::{bail, Result};

use feedhub_core::model::Pagination;
use feedhub_core::storage::{Database, FeedArticleRepository, FeedRepository};

pub async fn run(db: &Database, user_id: i64, feed_id: i64, limit: u32, offset: u32) -> Result<()> {
    let feeds = FeedRepository::new(db);
    let Some(feed) = feeds.find_for_owner(user_id, feed_id).await? else {
        bail!("feed {} not found", feed_id);
    };

    let links = FeedArticleRepository::new(db);
    let articles = links
        .list_for_feed(feed_id, Pagination { limit, offset })
        .await?;

    if articles.is_empty() {
        println!("No articles in '{}'.", feed.title);
        println!("\nTo pull from providers, run:");
        println!("  feedhub aggregate --user {} --feed {}", user_id, feed_id);
        return Ok(());
    }

    let total = links.count_for_feed(feed_id).await?;
    println!("Articles in '{}' ({} of {}):\n", feed.title, articles.len(), total);

    for article in &articles {
        let date = article
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        println!("  {} [{}] {}", date, article.provider, article.title);
        if let Some(url) = &article.url {
            println!("    {}", url);
        }
    }

    Ok(())
}
