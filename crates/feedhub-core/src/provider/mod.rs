mod hatena;
mod qiita;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::{Error, Result};

pub use hatena::parse_entries as parse_hatena_entries;
pub use qiita::parse_items as parse_qiita_items;

const MAX_RESPONSE_BYTES: usize = 5 * 1024 * 1024;

/// Closed set of built-in article sources.
///
/// Adding a source means adding a variant here plus its fetch/parse
/// pair; the aggregation control flow never changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    #[default]
    Qiita,
    Hatena,
}

impl ProviderTag {
    pub const ALL: [ProviderTag; 2] = [ProviderTag::Qiita, ProviderTag::Hatena];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::Qiita => "qiita",
            ProviderTag::Hatena => "hatena",
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "qiita" => Ok(ProviderTag::Qiita),
            "hatena" => Ok(ProviderTag::Hatena),
            other => Err(Error::Config(format!("unknown provider: {}", other))),
        }
    }
}

/// Provider-agnostic record as it came off the wire, before
/// normalization. Fields are optional because the two response shapes
/// disagree about what is mandatory.
#[derive(Debug, Clone, Default)]
pub struct RawArticle {
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub content_text: Option<String>,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// One page of raw records plus the cursor for the next one, if any
#[derive(Debug, Default)]
pub struct FetchPage {
    pub records: Vec<RawArticle>,
    pub next_page: Option<u32>,
}

/// HTTP client shared by all providers
pub struct ProviderClient {
    client: Client,
    qiita_base_url: String,
    qiita_token: Option<String>,
    qiita_per_page: u32,
    qiita_max_pages: u32,
    hatena_feed_url: String,
}

impl ProviderClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.sync.request_timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            qiita_base_url: config.qiita.base_url.trim_end_matches('/').to_string(),
            qiita_token: config.qiita.access_token.clone(),
            qiita_per_page: config.qiita.per_page,
            qiita_max_pages: config.qiita.max_pages,
            hatena_feed_url: config.hatena.feed_url.clone(),
        })
    }

    /// Fetch a single page of raw records from one provider.
    ///
    /// Network failures and non-2xx statuses surface as
    /// `ProviderUnavailable` carrying the tag; a malformed element
    /// inside an otherwise valid response is skipped, not fatal.
    pub async fn fetch_page(&self, tag: ProviderTag, page: Option<u32>) -> Result<FetchPage> {
        match tag {
            ProviderTag::Qiita => qiita::fetch_page(self, page.unwrap_or(1)).await,
            ProviderTag::Hatena => hatena::fetch_page(self).await,
        }
    }

    /// Fetch all pages a provider will give us, following the page
    /// cursor up to the configured cap.
    pub async fn fetch_all(&self, tag: ProviderTag) -> Result<Vec<RawArticle>> {
        let mut records = Vec::new();
        let mut page = None;
        let mut pages_fetched = 0u32;

        loop {
            let fetched = self.fetch_page(tag, page).await?;
            records.extend(fetched.records);
            pages_fetched += 1;

            match fetched.next_page {
                Some(next) if pages_fetched < self.qiita_max_pages => page = Some(next),
                _ => break,
            }
        }

        tracing::debug!(
            provider = %tag,
            pages = pages_fetched,
            records = records.len(),
            "Provider fetch complete"
        );

        Ok(records)
    }

    /// GET a URL and return the body, mapping failures to
    /// `ProviderUnavailable` for the given tag
    pub(crate) async fn get_bytes(&self, tag: ProviderTag, url: &str) -> Result<Bytes> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, application/atom+xml, application/rss+xml, application/xml;q=0.9, */*;q=0.8"),
        );
        if tag == ProviderTag::Qiita {
            if let Some(ref token) = self.qiita_token {
                if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                    headers.insert(AUTHORIZATION, value);
                }
            }
        }

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::ProviderUnavailable {
                provider: tag,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ProviderUnavailable {
                provider: tag,
                message: format!("HTTP {} for URL: {}", status, url),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::ProviderUnavailable {
                provider: tag,
                message: e.to_string(),
            })?;

        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(Error::ProviderUnavailable {
                provider: tag,
                message: format!("response too large ({} bytes) for URL: {}", bytes.len(), url),
            });
        }

        Ok(bytes)
    }

    pub(crate) fn qiita_base_url(&self) -> &str {
        &self.qiita_base_url
    }

    pub(crate) fn qiita_per_page(&self) -> u32 {
        self.qiita_per_page
    }

    pub(crate) fn hatena_feed_url(&self) -> &str {
        &self.hatena_feed_url
    }
}
