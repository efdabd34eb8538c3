//! Converts raw provider records into the internal article model.
//!
//! Pure functions, no I/O: the same raw record always normalizes to
//! the same content, so re-fetching never produces a different key.

use crate::model::NewArticle;
use crate::provider::{ProviderTag, RawArticle};
use crate::{Error, Result};

/// Map a raw record onto the internal schema.
///
/// The external identifier is the provider's native id/guid; when a
/// provider omits it, a stable hash of URL and title stands in. A
/// record without a title, or without any identity at all, is
/// `MalformedRecord` and gets skipped by the caller.
pub fn normalize(raw: &RawArticle, provider: ProviderTag) -> Result<NewArticle> {
    let title = raw
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::MalformedRecord(format!("{} record without title", provider)))?;

    let external_id = match raw.external_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => {
            let url = raw.url.as_deref().unwrap_or("");
            if url.is_empty() {
                return Err(Error::MalformedRecord(format!(
                    "{} record without id or url",
                    provider
                )));
            }
            derived_id(url, title)
        }
    };

    Ok(NewArticle {
        provider,
        external_id,
        title: title.to_string(),
        url: raw.url.clone(),
        author: raw.author.clone(),
        summary: raw.summary.clone(),
        content: raw.content.clone(),
        content_text: raw.content_text.clone(),
        categories: raw.categories.clone(),
        published_at: raw.published_at,
    })
}

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// Stable identifier derived from URL and title for records whose
/// provider gave them no native id.
///
/// FNV-1a spelled out by hand: the digest is persisted as part of the
/// (provider, external_id) key, so it must not change across compiler
/// or library versions. A NUL separates url from title so the pair
/// boundary is unambiguous.
fn derived_id(url: &str, title: &str) -> String {
    let mut hash = FNV_OFFSET;
    for byte in url.bytes().chain(std::iter::once(0)).chain(title.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("derived:{:016x}", hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: Option<&str>, title: Option<&str>, url: Option<&str>) -> RawArticle {
        RawArticle {
            external_id: id.map(String::from),
            title: title.map(String::from),
            url: url.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_native_id_preferred() {
        let record = raw(Some("abc123"), Some("A title"), Some("https://example.com/a"));
        let article = normalize(&record, ProviderTag::Qiita).unwrap();
        assert_eq!(article.external_id, "abc123");
        assert_eq!(article.provider, ProviderTag::Qiita);
    }

    #[test]
    fn test_missing_id_falls_back_to_derived_hash() {
        let record = raw(None, Some("A title"), Some("https://example.com/a"));
        let article = normalize(&record, ProviderTag::Hatena).unwrap();
        assert!(article.external_id.starts_with("derived:"));
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let record = raw(None, Some("A title"), Some("https://example.com/a"));
        let a = normalize(&record, ProviderTag::Hatena).unwrap();
        let b = normalize(&record, ProviderTag::Hatena).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derived_id_is_pinned() {
        // Derived ids are stored as dedup keys, so the digest for a
        // given url+title pair must never change.
        let record = raw(None, Some("A title"), Some("https://example.com/a"));
        let article = normalize(&record, ProviderTag::Hatena).unwrap();
        assert_eq!(article.external_id, "derived:c38954f5c8726aba");
    }

    #[test]
    fn test_different_urls_get_different_derived_ids() {
        let a = normalize(
            &raw(None, Some("Same title"), Some("https://example.com/a")),
            ProviderTag::Hatena,
        )
        .unwrap();
        let b = normalize(
            &raw(None, Some("Same title"), Some("https://example.com/b")),
            ProviderTag::Hatena,
        )
        .unwrap();
        assert_ne!(a.external_id, b.external_id);
    }

    #[test]
    fn test_missing_title_is_malformed() {
        let record = raw(Some("abc"), None, Some("https://example.com/a"));
        let err = normalize(&record, ProviderTag::Hatena).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }

    #[test]
    fn test_blank_title_is_malformed() {
        let record = raw(Some("abc"), Some("   "), None);
        assert!(normalize(&record, ProviderTag::Qiita).is_err());
    }

    #[test]
    fn test_no_identity_at_all_is_malformed() {
        let record = raw(None, Some("Only a title"), None);
        assert!(normalize(&record, ProviderTag::Qiita).is_err());
    }
}
