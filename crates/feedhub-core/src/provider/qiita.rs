//! Qiita API v2 client: JSON REST endpoint with page-number pagination.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{FetchPage, ProviderClient, ProviderTag, RawArticle};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct QiitaItem {
    id: String,
    title: String,
    url: String,
    #[serde(default)]
    body: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    tags: Vec<QiitaItemTag>,
    #[serde(default)]
    user: Option<QiitaItemUser>,
}

#[derive(Debug, Deserialize)]
struct QiitaItemTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct QiitaItemUser {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

pub(crate) async fn fetch_page(client: &ProviderClient, page: u32) -> Result<FetchPage> {
    let per_page = client.qiita_per_page();
    let url = format!(
        "{}/items?page={}&per_page={}",
        client.qiita_base_url(),
        page,
        per_page
    );

    tracing::debug!(page, %url, "Fetching Qiita items");

    let bytes = client.get_bytes(ProviderTag::Qiita, &url).await?;
    parse_items(&bytes, page, per_page)
}

/// Parse a Qiita items response body into raw records.
///
/// Each array element is decoded on its own so one malformed item is
/// logged and skipped without dropping the rest of the page. A body
/// that is not a JSON array at all counts as a provider failure.
pub fn parse_items(body: &[u8], page: u32, per_page: u32) -> Result<FetchPage> {
    let values: Vec<serde_json::Value> =
        serde_json::from_slice(body).map_err(|e| Error::ProviderUnavailable {
            provider: ProviderTag::Qiita,
            message: format!("unexpected response shape: {}", e),
        })?;

    let total = values.len();
    let mut records = Vec::with_capacity(total);

    for value in values {
        match serde_json::from_value::<QiitaItem>(value) {
            Ok(item) => records.push(item.into()),
            Err(e) => {
                tracing::warn!(provider = "qiita", error = %e, "Skipping malformed item");
            }
        }
    }

    // A full page suggests there is more; a short page ends pagination.
    let next_page = if total as u32 >= per_page {
        Some(page + 1)
    } else {
        None
    };

    Ok(FetchPage { records, next_page })
}

impl From<QiitaItem> for RawArticle {
    fn from(item: QiitaItem) -> Self {
        let author = item
            .user
            .map(|u| u.name.filter(|n| !n.is_empty()).unwrap_or(u.id));

        RawArticle {
            external_id: Some(item.id),
            title: Some(item.title),
            url: Some(item.url),
            author,
            summary: None,
            content: item.body,
            content_text: None,
            categories: item.tags.into_iter().map(|t| t.name).collect(),
            published_at: Some(item.created_at),
        }
    }
}
