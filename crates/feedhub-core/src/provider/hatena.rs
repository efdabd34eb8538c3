//! Hatena bookmark feed client: one fixed Atom endpoint, no pagination.

use chrono::{DateTime, Utc};
use feed_rs::parser;

use super::{FetchPage, ProviderClient, ProviderTag, RawArticle};
use crate::{Error, Result};

pub(crate) async fn fetch_page(client: &ProviderClient) -> Result<FetchPage> {
    let url = client.hatena_feed_url();

    tracing::debug!(%url, "Fetching Hatena feed");

    let bytes = client.get_bytes(ProviderTag::Hatena, url).await?;
    let records = parse_entries(&bytes)?;

    Ok(FetchPage {
        records,
        next_page: None,
    })
}

/// Parse an Atom/RSS document into raw records.
///
/// Entries keep whatever fields they have; deciding whether a record
/// is usable is the normalizer's call. A document that does not parse
/// as a feed at all counts as a provider failure.
pub fn parse_entries(body: &[u8]) -> Result<Vec<RawArticle>> {
    let feed = parser::parse(body).map_err(|e| Error::ProviderUnavailable {
        provider: ProviderTag::Hatena,
        message: format!("feed parse failed: {}", e),
    })?;

    let records = feed
        .entries
        .into_iter()
        .map(|entry| {
            let external_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id)
            };

            let title = entry.title.map(|t| t.content);

            // Prefer the rel=alternate link, matching Atom semantics
            let url = entry
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or_else(|| entry.links.first())
                .map(|l| l.href.clone());

            let author = entry.authors.first().map(|a| a.name.clone());
            let summary = entry.summary.map(|s| s.content);
            let content = entry.content.and_then(|c| c.body);
            let content_text = content.as_deref().map(html_to_text);

            let categories = entry
                .categories
                .into_iter()
                .map(|c| c.term)
                .filter(|t| !t.is_empty())
                .collect();

            let published_at = entry
                .published
                .or(entry.updated)
                .map(DateTime::<Utc>::from);

            RawArticle {
                external_id,
                title,
                url,
                author,
                summary,
                content,
                content_text,
                categories,
                published_at,
            }
        })
        .collect();

    Ok(records)
}

/// Convert HTML content to plain text
fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).unwrap_or_else(|_| html.to_string())
}
