//! Ordered handler chain with first-wins handling.

use std::fmt;

use tracing::debug;

use crate::config::Config;
use crate::network::HttpClient;

use super::{
    DirectHandler, DownloadHandler, DownloadResponse, EmbeddedHandler, HandleError, HandleStep,
    SnapshotHandler,
};

/// Handlers tried in registration order.
pub struct HandlerChain {
    handlers: Vec<Box<dyn DownloadHandler>>,
}

impl HandlerChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Builds the standard chain: embedded documents, snapshots, then the
    /// body itself.
    #[must_use]
    pub fn from_config(config: &Config, client: &HttpClient) -> Self {
        let mut chain = Self::new();
        chain.register(Box::new(EmbeddedHandler::new(
            client.clone(),
            config.archive.embedded_media_types.clone(),
        )));
        chain.register(Box::new(SnapshotHandler::new(
            config.snapshot.clone(),
            client.user_agent(),
        )));
        chain.register(Box::new(DirectHandler::new(
            config.handler_exclude_media_types(),
        )));
        chain
    }

    /// Appends a handler to the end of the chain.
    pub fn register(&mut self, handler: Box<dyn DownloadHandler>) {
        debug!(handler = handler.name(), position = self.handlers.len(), "Registering handler");
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the chain for `response`.
    ///
    /// # Errors
    ///
    /// Returns the first [`HandleError`] raised by a handler.
    #[tracing::instrument(skip(self, response), fields(url = %response.url))]
    pub async fn handle(&self, response: &DownloadResponse) -> Result<HandleStep, HandleError> {
        for handler in &self.handlers {
            if let HandleStep::Handled(content) = handler.handle(response).await? {
                debug!(
                    handler = handler.name(),
                    media_type = %content.media_type,
                    file_name = %content.file_name,
                    "Response handled"
                );
                return Ok(HandleStep::Handled(content));
            }
        }
        Ok(HandleStep::NotHandled)
    }
}

impl Default for HandlerChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("HandlerChain").field("handlers", &names).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use url::Url;

    use super::*;

    fn html_page() -> DownloadResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
        DownloadResponse {
            url: Url::parse("https://journal.example/landing").unwrap(),
            headers,
            body: b"<html><body>no pdf here</body></html>".to_vec(),
            media_type_hint: None,
        }
    }

    #[tokio::test]
    async fn test_default_chain_refuses_plain_landing_page() {
        let client = HttpClient::new("bibarchive-test").unwrap();
        let chain = HandlerChain::from_config(&Config::default(), &client);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.handle(&html_page()).await.unwrap(), HandleStep::NotHandled);
    }

    #[tokio::test]
    async fn test_chain_archives_html_when_not_excluded() {
        let mut chain = HandlerChain::new();
        chain.register(Box::new(DirectHandler::default()));

        let HandleStep::Handled(content) = chain.handle(&html_page()).await.unwrap() else {
            panic!("direct handler accepts everything by default");
        };
        assert_eq!(content.file_name, "landing.html");
    }

    #[tokio::test]
    async fn test_empty_chain_declines() {
        assert_eq!(
            HandlerChain::default().handle(&html_page()).await.unwrap(),
            HandleStep::NotHandled
        );
    }
}
