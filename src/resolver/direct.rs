//! Direct URL resolver, the last link of every chain.
//!
//! It accepts any locator and returns its URL unchanged. The orchestrator
//! has already followed redirects, so this is the landing page or file the
//! record points at.

use async_trait::async_trait;

use crate::locator::SourceLocator;

use super::{ContentOrigin, ResolveError, ResolveStep, ResolvedLocator, SourceResolver};

/// A resolver that passes the locator URL through.
#[derive(Debug, Default)]
pub struct DirectResolver;

impl DirectResolver {
    /// Creates a new `DirectResolver`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceResolver for DirectResolver {
    fn name(&self) -> &'static str {
        "direct"
    }

    #[tracing::instrument(skip(self, locator), fields(resolver = "direct", url = %locator.url))]
    async fn resolve(&self, locator: &SourceLocator) -> Result<ResolveStep, ResolveError> {
        Ok(ResolveStep::Resolved(ResolvedLocator {
            original_url: locator.url.clone(),
            resolved_url: locator.url.clone(),
            origin: ContentOrigin::ResolvedUrl,
            media_type_hint: None,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;

    #[tokio::test]
    async fn test_direct_resolver_passes_url_through() {
        let locator = SourceLocator {
            url: Url::parse("https://journal.example/article/1").unwrap(),
            doi: None,
        };
        let step = DirectResolver::new().resolve(&locator).await.unwrap();
        let ResolveStep::Resolved(resolved) = step else {
            panic!("direct resolver must always resolve");
        };
        assert_eq!(resolved.resolved_url, locator.url);
        assert_eq!(resolved.origin, ContentOrigin::ResolvedUrl);
        assert_eq!(resolved.media_type_hint, None);
    }
}
