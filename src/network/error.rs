//! Error types for the HTTP transport.

use thiserror::Error;

/// Transport-level failures.
///
/// A 404 is reported as [`NetworkError::HttpStatus`] like any other non-2xx
/// status; callers that treat "not found" as a decline check
/// [`NetworkError::is_not_found`].
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The server answered with a non-2xx status.
    #[error("{method} \"{url}\" returned HTTP {status}")]
    HttpStatus {
        /// Request method.
        method: &'static str,
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// The request did not complete within the configured timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// Connection, TLS, DNS or body read failure.
    #[error("network error requesting {url}: {source}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The URL could not be built or parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
    },

    /// The response body was not the JSON shape the caller expected.
    #[error("could not decode response from {url}: {reason}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// The HTTP client itself could not be constructed.
    #[error("could not build HTTP client: {reason}\n  Suggestion: check proxy environment variables")]
    ClientBuild {
        /// Builder failure message.
        reason: String,
    },
}

impl NetworkError {
    /// Creates an HTTP status error.
    pub fn http_status(method: &'static str, url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            method,
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Classifies a reqwest send/read failure.
    pub(crate) fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// Returns the HTTP status for status errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true when the server answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
