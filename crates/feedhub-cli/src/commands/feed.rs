use anyhow::Result;

use feedhub_core::model::NewFeed;
use feedhub_core::storage::{Database, FeedArticleRepository, FeedRepository};

pub async fn add(
    db: &Database,
    user_id: i64,
    title: &str,
    url: Option<String>,
    description: Option<String>,
) -> Result<()> {
    let repo = FeedRepository::new(db);
    let feed = repo
        .create(&NewFeed {
            user_id,
            title: title.to_string(),
            url,
            site_url: None,
            description,
        })
        .await?;

    println!("Created feed: {} ({})", feed.title, feed.id);
    Ok(())
}

pub async fn list(db: &Database, user_id: i64) -> Result<()> {
    let repo = FeedRepository::new(db);
    let links = FeedArticleRepository::new(db);
    let feeds = repo.list_by_owner(user_id).await?;

    if feeds.is_empty() {
        println!("No feeds yet.");
        println!("\nTo create one, run:");
        println!("  feedhub feed add --user {} <title>", user_id);
        return Ok(());
    }

    println!("Feeds ({}):\n", feeds.len());

    for feed in &feeds {
        let count = links.count_for_feed(feed.id).await?;
        println!("  {} - {} ({} articles)", feed.id, feed.title, count);
        if let Some(url) = &feed.url {
            println!("    URL: {}", url);
        }
        if let Some(last) = feed.last_fetched_at {
            println!("    Last aggregated: {}", last.format("%Y-%m-%d %H:%M"));
        }
        println!();
    }

    Ok(())
}

pub async fn rm(db: &Database, user_id: i64, feed_id: i64) -> Result<()> {
    let repo = FeedRepository::new(db);

    if repo.delete(user_id, feed_id).await? {
        println!("Deleted feed {}", feed_id);
    } else {
        println!("Feed {} not found.", feed_id);
    }

    Ok(())
}
