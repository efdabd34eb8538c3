use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderTag;

/// Registered account that owns feeds, tasks and external API entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// Opaque credential string; hashing is handled by the outer gateway
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
}

/// A user-defined collection point that articles get linked into
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub url: Option<String>,
    pub site_url: Option<String>,
    pub description: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new feed
#[derive(Debug, Clone, Deserialize)]
pub struct NewFeed {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Mutable feed fields accepted by an update
#[derive(Debug, Clone, Deserialize)]
pub struct FeedUpdate {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Normalized article shared across feeds.
///
/// Identity is (provider, external_id); the numeric id is assigned by
/// the database on first insert and reused on every later fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub provider: ProviderTag,
    pub external_id: String,
    pub title: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub content_text: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Data required to upsert an article
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub provider: ProviderTag,
    pub external_id: String,
    pub title: String,
    pub url: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub content_text: Option<String>,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Simple owned task item, unrelated to aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub user_id: i64,
    pub title: String,
}

/// User-registered external API endpoint, independent of the two
/// built-in aggregation providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalApi {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub base_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewExternalApi {
    pub user_id: i64,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Offset/limit window for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

fn default_limit() -> u32 {
    50
}
