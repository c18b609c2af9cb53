//! User-configured proxy resolution.
//!
//! Each rule holds URL templates and a hostname filter. For a locator whose
//! hostname passes a rule's filter, every template is rendered with the
//! locator's parts and probed; the first candidate that exists wins.
//!
//! Template variables: `%d` DOI, `%h` hostname, `%p` path without its
//! leading slash, `%D` directory of the path with a trailing slash, `%f`
//! last path segment.

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::config::ResolverRuleConfig;
use crate::locator::SourceLocator;
use crate::network::HttpClient;
use crate::pattern::{PROXY_VARS, Pattern, PatternError, PatternValues};

use super::{ContentOrigin, ResolveError, ResolveStep, ResolvedLocator, SourceResolver};

const RESOLVER_NAME: &str = "user";

/// Hostname include/exclude lists for a rule.
///
/// An empty include list admits every host; the exclude list always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostnameFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl HostnameFilter {
    /// Creates a filter from include and exclude lists.
    #[must_use]
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Returns true if `host` passes the filter.
    #[must_use]
    pub fn allows(&self, host: &str) -> bool {
        let listed = |list: &[String]| list.iter().any(|entry| entry.eq_ignore_ascii_case(host));
        (self.include.is_empty() || listed(&self.include)) && !listed(&self.exclude)
    }
}

/// One configured proxy rule.
#[derive(Debug, Clone)]
pub struct ResolverRule {
    templates: Vec<Pattern>,
    filter: HostnameFilter,
}

impl ResolverRule {
    /// Builds a rule, validating its templates.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if a template uses an unknown variable.
    pub fn from_config(config: &ResolverRuleConfig) -> Result<Self, PatternError> {
        let templates = config
            .schemes
            .iter()
            .map(|scheme| Pattern::parse(scheme, PROXY_VARS))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            templates,
            filter: HostnameFilter::new(
                config.include_hostnames.clone(),
                config.exclude_hostnames.clone(),
            ),
        })
    }
}

/// Resolver that probes user-configured proxy URLs.
#[derive(Debug, Clone)]
pub struct UserResolver {
    client: HttpClient,
    rules: Vec<ResolverRule>,
}

impl UserResolver {
    /// Creates a resolver from configured rules.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if any template is invalid.
    pub fn new(client: HttpClient, rules: &[ResolverRuleConfig]) -> Result<Self, PatternError> {
        let rules = rules
            .iter()
            .map(ResolverRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { client, rules })
    }

    /// Number of configured rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Candidate URLs for `locator`, in rule then template order.
    ///
    /// Templates that render empty, reference a missing value or produce an
    /// unparseable URL are skipped.
    #[must_use]
    pub fn candidates(&self, locator: &SourceLocator) -> Vec<Url> {
        let host = locator.url.host_str().unwrap_or_default();
        let values = proxy_values(locator);

        let mut candidates = Vec::new();
        for rule in self.rules.iter().filter(|rule| rule.filter.allows(host)) {
            for template in &rule.templates {
                let Some(rendered) = template.render(&values) else {
                    continue;
                };
                if rendered.trim().is_empty() {
                    continue;
                }
                match Url::parse(rendered.trim()) {
                    Ok(url) => candidates.push(url),
                    Err(error) => {
                        debug!(template = %template, rendered = %rendered, error = %error, "Skipping unparseable proxy URL");
                    }
                }
            }
        }
        candidates
    }
}

#[async_trait]
impl SourceResolver for UserResolver {
    fn name(&self) -> &'static str {
        RESOLVER_NAME
    }

    #[tracing::instrument(skip(self, locator), fields(resolver = RESOLVER_NAME, url = %locator.url))]
    async fn resolve(&self, locator: &SourceLocator) -> Result<ResolveStep, ResolveError> {
        for candidate in self.candidates(locator) {
            let exists = self
                .client
                .check_exists(&candidate)
                .await
                .map_err(|error| ResolveError::transport(RESOLVER_NAME, error))?;
            if exists {
                debug!(candidate = %candidate, "Proxy candidate exists");
                return Ok(ResolveStep::Resolved(ResolvedLocator {
                    original_url: locator.url.clone(),
                    resolved_url: candidate,
                    origin: ContentOrigin::UserResolver,
                    media_type_hint: None,
                }));
            }
            debug!(candidate = %candidate, "Proxy candidate not found");
        }
        Ok(ResolveStep::NotResolved)
    }
}

fn proxy_values(locator: &SourceLocator) -> PatternValues {
    let path = locator.url.path();
    PatternValues::new()
        .with('d', locator.doi.clone())
        .with('h', locator.url.host_str())
        .with('p', Some(path.trim_start_matches('/')))
        .with('D', Some(directory_of(path)))
        .with('f', Some(last_segment(path)))
}

fn directory_of(path: &str) -> String {
    let directory = match path.rfind('/') {
        Some(0) => "/",
        Some(index) => &path[..index],
        None => ".",
    };
    format!("{}/", directory.trim_start_matches('/'))
}

fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn rule<S: AsRef<str>>(schemes: &[S], include: &[&str], exclude: &[&str]) -> ResolverRuleConfig {
        ResolverRuleConfig {
            schemes: schemes.iter().map(|s| s.as_ref().to_string()).collect(),
            include_hostnames: include.iter().map(ToString::to_string).collect(),
            exclude_hostnames: exclude.iter().map(ToString::to_string).collect(),
        }
    }

    fn locator(url: &str, doi: Option<&str>) -> SourceLocator {
        SourceLocator {
            url: Url::parse(url).unwrap(),
            doi: doi.map(ToString::to_string),
        }
    }

    fn client() -> HttpClient {
        HttpClient::new("bibarchive-test").unwrap()
    }

    #[test]
    fn test_hostname_filter_include_and_exclude() {
        let open = HostnameFilter::default();
        assert!(open.allows("anything.example"));

        let only = HostnameFilter::new(vec!["a.example".into()], vec![]);
        assert!(only.allows("a.example"));
        assert!(only.allows("A.Example"));
        assert!(!only.allows("b.example"));

        let both = HostnameFilter::new(vec!["a.example".into()], vec!["a.example".into()]);
        assert!(!both.allows("a.example"));

        let excluded = HostnameFilter::new(vec![], vec!["b.example".into()]);
        assert!(excluded.allows("a.example"));
        assert!(!excluded.allows("b.example"));
    }

    #[test]
    fn test_candidates_substitute_locator_parts() {
        let resolver = UserResolver::new(
            client(),
            &[rule(&["https://proxy.example/%h/%p", "https://mirror.example/%D%f?doi=%d"], &[], &[])],
        )
        .unwrap();
        let candidates = resolver.candidates(&locator(
            "https://journal.example/vol/2/paper.pdf",
            Some("10.1234/abc"),
        ));
        let urls: Vec<&str> = candidates.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://proxy.example/journal.example/vol/2/paper.pdf",
                "https://mirror.example/vol/2/paper.pdf?doi=10.1234/abc",
            ]
        );
    }

    #[test]
    fn test_candidates_skip_missing_values_and_empty_renders() {
        let resolver = UserResolver::new(
            client(),
            &[rule(&["https://sci.example/%d", "%f", "https://proxy.example/%p"], &[], &[])],
        )
        .unwrap();
        // No DOI and an empty path: the first template lacks a value, the
        // second renders empty.
        let candidates = resolver.candidates(&locator("https://journal.example/", None));
        let urls: Vec<&str> = candidates.iter().map(Url::as_str).collect();
        assert_eq!(urls, vec!["https://proxy.example/"]);
    }

    #[test]
    fn test_candidates_respect_hostname_filters() {
        let resolver = UserResolver::new(
            client(),
            &[
                rule(&["https://a-proxy.example/%p"], &["a.example"], &[]),
                rule(&["https://other-proxy.example/%p"], &[], &["a.example"]),
            ],
        )
        .unwrap();

        let for_a = resolver.candidates(&locator("https://a.example/x.pdf", None));
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].host_str(), Some("a-proxy.example"));

        let for_b = resolver.candidates(&locator("https://b.example/x.pdf", None));
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].host_str(), Some("other-proxy.example"));
    }

    #[test]
    fn test_invalid_template_variable_is_rejected() {
        let error = UserResolver::new(client(), &[rule(&["https://p.example/%i"], &[], &[])])
            .unwrap_err();
        assert!(matches!(error, PatternError::InvalidVar { variable: 'i', .. }));
    }

    #[test]
    fn test_directory_and_last_segment() {
        assert_eq!(directory_of("/a/b/c.pdf"), "a/b/");
        assert_eq!(directory_of("/c.pdf"), "/");
        assert_eq!(last_segment("/a/b/c.pdf"), "c.pdf");
        assert_eq!(last_segment("/a/b/"), "b");
        assert_eq!(last_segment("/"), "");
    }

    #[tokio::test]
    async fn test_resolve_returns_first_existing_candidate() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/first/paper.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/second/paper.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/third/paper.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let base = server.uri();
        let resolver = UserResolver::new(
            client(),
            &[rule(
                &[
                    format!("{base}/first/%f"),
                    format!("{base}/second/%f"),
                    format!("{base}/third/%f"),
                ],
                &[],
                &[],
            )],
        )
        .unwrap();

        let step = resolver
            .resolve(&locator("https://journal.example/x/paper.pdf", None))
            .await
            .unwrap();
        let ResolveStep::Resolved(resolved) = step else {
            panic!("expected the second candidate to resolve");
        };
        assert_eq!(resolved.resolved_url.path(), "/second/paper.pdf");
        assert_eq!(resolved.origin, ContentOrigin::UserResolver);
    }

    #[tokio::test]
    async fn test_resolve_declines_when_nothing_exists() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        let resolver = UserResolver::new(
            client(),
            &[rule(&[format!("{}/none/%f", server.uri())], &[], &[])],
        )
        .unwrap();
        let step = resolver
            .resolve(&locator("https://journal.example/x/paper.pdf", None))
            .await
            .unwrap();
        assert_eq!(step, ResolveStep::NotResolved);
    }
}
