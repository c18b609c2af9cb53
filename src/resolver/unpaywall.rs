//! Open-access lookup through the Unpaywall API.
//!
//! `GET {base}/v2/{doi}?email={email}` returns a JSON document whose
//! `best_oa_location.url_for_pdf` points at a free copy when one is known.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::locator::SourceLocator;
use crate::network::HttpClient;
use crate::network::media::PDF_MEDIA_TYPE;

use super::{ContentOrigin, ResolveError, ResolveStep, ResolvedLocator, SourceResolver};

/// Production Unpaywall API root.
pub const UNPAYWALL_API_BASE: &str = "https://api.unpaywall.org";

const RESOLVER_NAME: &str = "unpaywall";

#[derive(Debug, Deserialize)]
struct UnpaywallRecord {
    best_oa_location: Option<OpenAccessLocation>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessLocation {
    url_for_pdf: Option<String>,
}

/// Looks up open-access PDFs by DOI.
#[derive(Debug, Clone)]
pub struct UnpaywallResolver {
    client: HttpClient,
    email: String,
    base_url: String,
}

impl UnpaywallResolver {
    /// Creates a resolver against the production API.
    ///
    /// Unpaywall requires a contact email on every request.
    #[must_use]
    pub fn new(client: HttpClient, email: impl Into<String>) -> Self {
        Self::with_base_url(client, email, UNPAYWALL_API_BASE)
    }

    /// Creates a resolver against a custom API root.
    #[must_use]
    pub fn with_base_url(
        client: HttpClient,
        email: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            email: email.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn lookup_url(&self, doi: &str) -> Option<Url> {
        Url::parse(&format!(
            "{}/v2/{}?email={}",
            self.base_url,
            urlencoding::encode(doi),
            urlencoding::encode(&self.email)
        ))
        .ok()
    }
}

#[async_trait]
impl SourceResolver for UnpaywallResolver {
    fn name(&self) -> &'static str {
        RESOLVER_NAME
    }

    #[tracing::instrument(skip(self, locator), fields(resolver = RESOLVER_NAME, doi = ?locator.doi))]
    async fn resolve(&self, locator: &SourceLocator) -> Result<ResolveStep, ResolveError> {
        let Some(doi) = locator.doi.as_deref() else {
            return Ok(ResolveStep::NotResolved);
        };
        let Some(lookup_url) = self.lookup_url(doi) else {
            debug!(base_url = %self.base_url, "Unpaywall lookup URL is not valid");
            return Ok(ResolveStep::NotResolved);
        };

        let record: UnpaywallRecord = match self.client.get_json(&lookup_url, &[]).await {
            Ok(record) => record,
            Err(error) if error.is_not_found() => {
                debug!("DOI unknown to Unpaywall");
                return Ok(ResolveStep::NotResolved);
            }
            Err(error) => return Err(ResolveError::transport(RESOLVER_NAME, error)),
        };

        let Some(pdf_url) = record
            .best_oa_location
            .and_then(|location| location.url_for_pdf)
            .filter(|url| !url.trim().is_empty())
        else {
            debug!("No open-access PDF location");
            return Ok(ResolveStep::NotResolved);
        };

        match Url::parse(pdf_url.trim()) {
            Ok(resolved_url) => {
                debug!(resolved_url = %resolved_url, "Open-access PDF located");
                Ok(ResolveStep::Resolved(ResolvedLocator {
                    original_url: locator.url.clone(),
                    resolved_url,
                    origin: ContentOrigin::OpenAccess,
                    media_type_hint: Some(PDF_MEDIA_TYPE.to_string()),
                }))
            }
            Err(error) => {
                debug!(url = %pdf_url, error = %error, "Unpaywall returned an unusable URL");
                Ok(ResolveStep::NotResolved)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn locator(doi: Option<&str>) -> SourceLocator {
        SourceLocator {
            url: Url::parse("https://doi.org/10.1234%2Fabc").unwrap(),
            doi: doi.map(ToString::to_string),
        }
    }

    fn resolver(base: &str) -> UnpaywallResolver {
        UnpaywallResolver::with_base_url(
            HttpClient::new("bibarchive-test").unwrap(),
            "me@example.org",
            base,
        )
    }

    #[tokio::test]
    async fn test_unpaywall_resolves_best_location_pdf() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/v2/10.1234%2Fabc"))
            .and(query_param("email", "me@example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "doi": "10.1234/abc",
                "best_oa_location": { "url_for_pdf": "https://repo.example/abc.pdf" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let step = resolver(&server.uri())
            .resolve(&locator(Some("10.1234/abc")))
            .await
            .unwrap();
        let ResolveStep::Resolved(resolved) = step else {
            panic!("expected a resolved locator");
        };
        assert_eq!(resolved.resolved_url.as_str(), "https://repo.example/abc.pdf");
        assert_eq!(resolved.origin, ContentOrigin::OpenAccess);
        assert_eq!(resolved.media_type_hint.as_deref(), Some(PDF_MEDIA_TYPE));
    }

    #[tokio::test]
    async fn test_unpaywall_declines_without_doi() {
        let step = resolver("http://127.0.0.1:9")
            .resolve(&locator(None))
            .await
            .unwrap();
        assert_eq!(step, ResolveStep::NotResolved);
    }

    #[tokio::test]
    async fn test_unpaywall_declines_on_null_location_and_404() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/v2/10.1234%2Fclosed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "best_oa_location": null })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/10.1234%2Fempty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "best_oa_location": { "url_for_pdf": "" }
            })))
            .mount(&server)
            .await;

        let resolver = resolver(&server.uri());
        for doi in ["10.1234/closed", "10.1234/empty", "10.1234/missing"] {
            let step = resolver.resolve(&locator(Some(doi))).await.unwrap();
            assert_eq!(step, ResolveStep::NotResolved, "{doi}");
        }
    }

    #[tokio::test]
    async fn test_unpaywall_server_error_is_reported() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let error = resolver(&server.uri())
            .resolve(&locator(Some("10.1234/abc")))
            .await
            .unwrap_err();
        assert_eq!(error.resolver(), RESOLVER_NAME);
    }
}
