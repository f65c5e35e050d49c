//! Canonicalization - stable identity and content fingerprint.
//!
//! A pure transform from a raw `SourceItem` to a `CanonicalRecord`.
//! The key recognizes the "same" logical item across runs; the hash
//! detects edits under a stable key without reacting to formatting
//! noise.

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::PipelineError;
use crate::types::{CanonicalRecord, SourceItem};

/// Derive a canonical record from a source item.
///
/// Key precedence: stable external id over URL over title slug.
/// Items with none of the three are rejected as `InvalidItem`.
pub fn canonicalize(item: &SourceItem) -> Result<CanonicalRecord, PipelineError> {
    let canonical_key = canonical_key(item)?;
    Ok(CanonicalRecord {
        canonical_key,
        content_hash: content_hash(item),
        bucket: item.bucket.clone(),
        first_seen_at: item.fetched_at,
    })
}

/// Derive the canonical key for an item.
pub fn canonical_key(item: &SourceItem) -> Result<String, PipelineError> {
    if let Some(id) = item.external_id.as_deref().filter(|s| !s.trim().is_empty()) {
        return Ok(format!("{}:{}", item.source, id.trim()));
    }

    if let Some(url) = item.url.as_deref().filter(|s| !s.trim().is_empty()) {
        return normalize_url(url).ok_or_else(|| PipelineError::InvalidItem {
            reason: format!("unparseable URL: {url}"),
        });
    }

    if let Some(title) = item.title.as_deref() {
        let slug = slugify(title);
        if !slug.is_empty() {
            return Ok(format!("{}:{}", item.source, slug));
        }
    }

    Err(PipelineError::InvalidItem {
        reason: "no external id, URL, or title to derive a key from".into(),
    })
}

/// SHA-256 over the normalized content projection.
///
/// Projection: collapsed-whitespace body, title, and the sorted tag
/// list. Reordering tags or reflowing whitespace yields the same hash.
pub fn content_hash(item: &SourceItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collapse_whitespace(&item.body).as_bytes());
    hasher.update(b"\n");
    hasher.update(item.title.as_deref().unwrap_or("").trim().as_bytes());
    hasher.update(b"\n");

    let mut tags: Vec<&str> = item.tags.iter().map(|t| t.as_str()).collect();
    tags.sort_unstable();
    hasher.update(tags.join(",").as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Normalize a URL into a stable key: lowercased host, no fragment,
/// no trailing slash, tracking query parameters dropped.
fn normalize_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_lowercase();

    let path = url.path().trim_end_matches('/');

    let mut query_pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    query_pairs.sort();

    let mut key = format!("{host}{path}");
    if !query_pairs.is_empty() {
        let query: Vec<String> = query_pairs
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        key.push('?');
        key.push_str(&query.join("&"));
    }
    Some(key)
}

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || matches!(name, "ref" | "fbclid" | "gclid")
}

/// Collapse all whitespace runs to single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased ascii-alphanumeric slug with `-` separators.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> SourceItem {
        SourceItem::new("github-trending", "daily", "A fast parser.\n\nWritten in Rust.")
    }

    #[test]
    fn test_external_id_preferred() {
        let item = item()
            .with_external_id("owner/repo")
            .with_url("https://github.com/owner/repo")
            .with_title("repo");

        let key = canonical_key(&item).unwrap();
        assert_eq!(key, "github-trending:owner/repo");
    }

    #[test]
    fn test_url_normalization() {
        let a = item().with_url("https://Example.com/Post/?utm_source=x#frag");
        let b = item().with_url("https://example.com/Post");

        assert_eq!(
            canonical_key(&a).unwrap(),
            canonical_key(&b).unwrap()
        );
    }

    #[test]
    fn test_meaningful_query_kept() {
        let a = item().with_url("https://example.com/p?id=7");
        let b = item().with_url("https://example.com/p?id=8");

        assert_ne!(canonical_key(&a).unwrap(), canonical_key(&b).unwrap());
    }

    #[test]
    fn test_title_fallback() {
        let item = item().with_title("Hello, World! 2024");
        assert_eq!(
            canonical_key(&item).unwrap(),
            "github-trending:hello-world-2024"
        );
    }

    #[test]
    fn test_no_identifier_rejected() {
        let err = canonical_key(&item()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidItem { .. }));
    }

    #[test]
    fn test_hash_ignores_formatting() {
        let a = item().with_title("T").with_tag("rust").with_tag("cli");
        let mut b = item().with_title("T").with_tag("cli").with_tag("rust");
        b.body = "A  fast parser.\nWritten   in Rust.".into();

        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_hash_detects_edits() {
        let a = item();
        let mut b = item();
        b.body.push_str(" Now with SIMD.");

        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
