//! Thin HTTP client used by every network step of a run.
//!
//! One client is built per run and shared by the resolvers, handlers and the
//! Zotero client. It sends the configured User-Agent on every request, keeps a
//! cookie jar (some publishers set a session cookie on the landing page that
//! the PDF request needs) and enforces a fixed per-request timeout.
//!
//! The post-redirect URL is read from each response, so concurrent requests
//! never share redirect state.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, Proxy};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use super::NetworkError;

/// Per-request timeout applied when the configuration does not override it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after following redirects.
    pub url: Url,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns a header value as text, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// HTTP client with the run's identification header and timeout.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    /// Creates a client with the default 15 second request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::ClientBuild`] if the underlying client cannot
    /// be constructed.
    pub fn new(user_agent: &str) -> Result<Self, NetworkError> {
        Self::with_timeout(user_agent, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::ClientBuild`] if the underlying client cannot
    /// be constructed.
    pub fn with_timeout(user_agent: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let client = build_client(user_agent, timeout)?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// The User-Agent sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Fetches a URL and reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] on transport failure or a non-2xx status.
    pub async fn get(&self, url: &Url) -> Result<HttpResponse, NetworkError> {
        self.get_with_headers(url, &[]).await
    }

    /// Fetches a URL with extra request headers and reads the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] on transport failure or a non-2xx status.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_headers(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, NetworkError> {
        let response = self.send(url, headers).await?;
        let final_url = response.url().clone();
        let response_headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::from_reqwest(url.as_str(), e))?
            .to_vec();

        debug!(final_url = %final_url, bytes = body.len(), "Fetched response");
        Ok(HttpResponse {
            url: final_url,
            headers: response_headers,
            body,
        })
    }

    /// Follows the redirect chain of `url` and returns where it ends.
    ///
    /// The body of the final response is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] on transport failure or a non-2xx final status.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn resolve_redirect(&self, url: &Url) -> Result<Url, NetworkError> {
        let response = self.send(url, &[]).await?;
        let final_url = response.url().clone();
        if final_url != *url {
            debug!(final_url = %final_url, "Redirect resolved");
        }
        Ok(final_url)
    }

    /// Probes whether `url` exists: 2xx means yes, 404 means no.
    ///
    /// The body is discarded without being read.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] for any failure other than a 404.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn check_exists(&self, url: &Url) -> Result<bool, NetworkError> {
        match self.send(url, &[]).await {
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Fetches a URL and decodes its body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::Decode`] when the body is not the expected
    /// shape, or any transport error from the request.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> Result<T, NetworkError> {
        let response = self.get_with_headers(url, headers).await?;
        serde_json::from_slice(&response.body).map_err(|e| NetworkError::decode(url.as_str(), e))
    }

    async fn send(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> Result<reqwest::Response, NetworkError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(NetworkError::http_status(
                "GET",
                url.as_str(),
                response.status().as_u16(),
            ));
        }

        Ok(response)
    }
}

fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, NetworkError> {
    match try_build_client(user_agent, timeout, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; fall back to environment proxies only.
            warn!("HTTP client builder panicked while loading system proxy settings; retrying with env-proxy fallback");
            match try_build_client(user_agent, timeout, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(NetworkError::ClientBuild {
                    reason: "client construction panicked".to_string(),
                }),
                Err(BuildClientFailure::Build(error)) => Err(NetworkError::ClientBuild {
                    reason: error.to_string(),
                }),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(NetworkError::ClientBuild {
            reason: error.to_string(),
        }),
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    user_agent: &str,
    timeout: Duration,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    let user_agent = user_agent.to_string();
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(user_agent, timeout);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(user_agent: String, timeout: Duration) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .timeout(timeout)
        .user_agent(user_agent)
        .cookie_store(true)
        .gzip(true)
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    for scheme in ["https", "http"] {
        let Some(proxy) = env_proxy_for_scheme(scheme) else {
            continue;
        };
        let resolved = match scheme {
            "https" => Proxy::https(&proxy),
            _ => Proxy::http(&proxy),
        };
        if let Ok(resolved) = resolved {
            builder = builder.proxy(resolved);
        }
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
