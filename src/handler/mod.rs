//! Turning a fetched HTTP response into archivable content.
//!
//! Like resolution, handling is an ordered chain where the first handler
//! that accepts the response wins:
//!
//! 1. [`EmbeddedHandler`] - an HTML page embedding a document of a wanted
//!    media type through `<object>` or `<embed>`; the embedded document is
//!    fetched and returned.
//! 2. [`SnapshotHandler`] - an HTML page converted to a self-contained
//!    snapshot by an external tool.
//! 3. [`DirectHandler`] - the response body itself, unless its media type
//!    is excluded.

mod chain;
mod direct;
mod embedded;
mod error;
mod filename;
mod snapshot;

pub use chain::HandlerChain;
pub use direct::DirectHandler;
pub use embedded::{EmbeddedHandler, EmbeddedSource, find_embedded_source};
pub use error::HandleError;
pub use filename::infer_file_name;
pub use snapshot::{SnapshotHandler, snapshot_args};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use url::Url;

use crate::network::HttpResponse;
use crate::network::media::{DEFAULT_MEDIA_TYPE, parse_media_type};

/// A fetched response offered to the handler chain.
#[derive(Debug, Clone)]
pub struct DownloadResponse {
    /// Final URL after redirects.
    pub url: Url,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Vec<u8>,
    /// Media type the resolver expected, used when the server is vague.
    pub media_type_hint: Option<String>,
}

impl DownloadResponse {
    /// Wraps a fetched response together with the resolver's hint.
    #[must_use]
    pub fn from_http(response: HttpResponse, media_type_hint: Option<String>) -> Self {
        Self {
            url: response.url,
            headers: response.headers,
            body: response.body,
            media_type_hint,
        }
    }

    /// Effective media type of the body.
    ///
    /// A valid `Content-Type` wins unless it is the generic binary type and
    /// a hint exists. Without a usable header the hint is used, and without
    /// a hint the generic binary type.
    #[must_use]
    pub fn media_type(&self) -> String {
        let declared = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_media_type);
        let hint = self.media_type_hint.as_deref().and_then(parse_media_type);

        match (declared, hint) {
            (Some(declared), Some(hint)) if declared == DEFAULT_MEDIA_TYPE => hint,
            (Some(declared), _) => declared,
            (None, Some(hint)) => hint,
            (None, None) => DEFAULT_MEDIA_TYPE.to_string(),
        }
    }
}

/// Content a handler extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContent {
    /// Raw bytes to archive.
    pub content: Vec<u8>,
    /// Media type of `content`.
    pub media_type: String,
    /// Suggested file name.
    pub file_name: String,
}

/// Outcome of a single handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleStep {
    /// The handler produced content.
    Handled(SourceContent),
    /// The handler does not apply to this response.
    NotHandled,
}

/// A strategy for extracting content from a response.
#[async_trait]
pub trait DownloadHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Attempts to handle `response`.
    async fn handle(&self, response: &DownloadResponse) -> Result<HandleStep, HandleError>;
}
