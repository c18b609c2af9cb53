//! Locating a bibliographic record on the network.
//!
//! A [`SourceLocator`] is derived once per record from its `doi` and `url`
//! fields. When the record has no usable URL but has a DOI, the canonical
//! `https://doi.org/` URL is used instead.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::parser::BibEntry;

/// Prefix of canonical DOI URLs.
pub const CANONICAL_DOI_URL_PREFIX: &str = "https://doi.org/";

#[allow(clippy::expect_used)]
static DOI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(doi:|(https?://)?(dx\.)?doi\.org/)?(10\.[0-9]{4,}(\.[0-9]+)*/\S+)$")
        .expect("DOI regex is valid")
});
const DOI_MATCH_GROUP: usize = 4;

/// Where a record's content might be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    /// Addressable target.
    pub url: Url,
    /// Bare DOI (`10.xxxx/...`) when known.
    pub doi: Option<String>,
}

/// Extracts a bare DOI from a DOI field value or DOI URL.
///
/// Accepts `10.x/y`, `doi:10.x/y` and `https://doi.org/10.x/y` (also
/// `dx.doi.org` and schemeless forms).
#[must_use]
pub fn extract_doi(raw: &str) -> Option<String> {
    DOI_PATTERN
        .captures(raw.trim())
        .and_then(|captures| captures.get(DOI_MATCH_GROUP))
        .map(|m| m.as_str().to_string())
}

/// Derives a locator from an entry's fields.
///
/// Returns `None` when neither a parseable absolute URL nor a DOI is present;
/// that is a decline for network acquisition, not an error.
#[must_use]
pub fn locate_entry(entry: &BibEntry) -> Option<SourceLocator> {
    locate_entry_with_resolver(entry, CANONICAL_DOI_URL_PREFIX)
}

/// Like [`locate_entry`], building DOI-only URLs under `doi_resolver`
/// instead of `https://doi.org/`.
#[must_use]
pub fn locate_entry_with_resolver(entry: &BibEntry, doi_resolver: &str) -> Option<SourceLocator> {
    let mut doi = entry.field("doi").and_then(extract_doi);

    let mut url = None;
    if let Some(raw_url) = entry.field("url") {
        match Url::parse(raw_url.trim()) {
            Ok(parsed) => {
                if doi.is_none() {
                    doi = extract_doi(raw_url);
                }
                url = Some(parsed);
            }
            Err(error) => {
                debug!(cite_key = %entry.key, url = %raw_url, error = %error, "Malformed BibTeX URL");
            }
        }
    }

    let url = match (url, &doi) {
        (Some(url), _) => url,
        (None, Some(doi)) => resolver_url(doi_resolver, doi)?,
        (None, None) => {
            debug!(cite_key = %entry.key, "Could not locate entry: no URL or DOI");
            return None;
        }
    };

    Some(SourceLocator { url, doi })
}

/// Canonical resolver URL for a DOI.
#[must_use]
pub fn doi_url(doi: &str) -> Option<Url> {
    resolver_url(CANONICAL_DOI_URL_PREFIX, doi)
}

fn resolver_url(prefix: &str, doi: &str) -> Option<Url> {
    Url::parse(&format!("{prefix}{}", urlencoding::encode(doi))).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_doi_accepts_bare_prefixed_and_url_forms() {
        assert_eq!(extract_doi("10.1234/abc").as_deref(), Some("10.1234/abc"));
        assert_eq!(extract_doi("doi:10.1234/abc").as_deref(), Some("10.1234/abc"));
        assert_eq!(
            extract_doi("https://doi.org/10.1234/abc").as_deref(),
            Some("10.1234/abc")
        );
        assert_eq!(
            extract_doi("http://dx.doi.org/10.12345.6/a(b)").as_deref(),
            Some("10.12345.6/a(b)")
        );
    }

    #[test]
    fn test_extract_doi_rejects_non_doi() {
        assert_eq!(extract_doi("https://example.com/10.1234/abc"), None);
        assert_eq!(extract_doi("10.12/short-registrant"), None);
        assert_eq!(extract_doi(""), None);
    }

    #[test]
    fn test_locate_entry_prefers_url_field_and_keeps_doi() {
        let entry = BibEntry::new("article", "k")
            .with_field("doi", "10.1234/abc")
            .with_field("url", "https://example.com/paper");
        let locator = locate_entry(&entry).unwrap();
        assert_eq!(locator.url.as_str(), "https://example.com/paper");
        assert_eq!(locator.doi.as_deref(), Some("10.1234/abc"));
    }

    #[test]
    fn test_locate_entry_extracts_doi_from_url() {
        let entry = BibEntry::new("article", "k").with_field("url", "https://doi.org/10.1234/abc");
        let locator = locate_entry(&entry).unwrap();
        assert_eq!(locator.doi.as_deref(), Some("10.1234/abc"));
    }

    #[test]
    fn test_locate_entry_doi_only_builds_canonical_url() {
        let entry = BibEntry::new("article", "k").with_field("doi", "10.1234/abc");
        let locator = locate_entry(&entry).unwrap();
        assert_eq!(locator.url.as_str(), "https://doi.org/10.1234%2Fabc");
    }

    #[test]
    fn test_locate_entry_with_resolver_uses_given_prefix() {
        let entry = BibEntry::new("article", "k").with_field("doi", "10.1234/abc");
        let locator = locate_entry_with_resolver(&entry, "http://127.0.0.1:9/doi/").unwrap();
        assert_eq!(locator.url.as_str(), "http://127.0.0.1:9/doi/10.1234%2Fabc");
        assert_eq!(locator.doi.as_deref(), Some("10.1234/abc"));

        let with_url = entry.with_field("url", "https://example.com/paper");
        let locator = locate_entry_with_resolver(&with_url, "http://127.0.0.1:9/doi/").unwrap();
        assert_eq!(locator.url.as_str(), "https://example.com/paper");
    }

    #[test]
    fn test_locate_entry_malformed_url_falls_back_to_doi() {
        let entry = BibEntry::new("article", "k")
            .with_field("url", "not a url")
            .with_field("doi", "10.1234/abc");
        let locator = locate_entry(&entry).unwrap();
        assert!(locator.url.as_str().starts_with(CANONICAL_DOI_URL_PREFIX));
    }

    #[test]
    fn test_locate_entry_without_url_or_doi_declines() {
        let entry = BibEntry::new("article", "k").with_field("title", "Lost");
        assert_eq!(locate_entry(&entry), None);
    }
}
