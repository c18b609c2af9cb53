//! Extraction of documents embedded in HTML landing pages.
//!
//! Many publishers serve the PDF inside a viewer page through an
//! `<object data=...>` or `<embed src=...>` element. The first such element
//! (depth-first, document order) whose `type` attribute is one of the
//! configured media types is followed.

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::debug;
use url::Url;

use crate::network::HttpClient;
use crate::network::media::{HTML_MEDIA_TYPE, parse_media_type};

use super::{
    DownloadHandler, DownloadResponse, HandleError, HandleStep, SourceContent, infer_file_name,
};

const HANDLER_NAME: &str = "embedded";

/// An embedded document reference found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSource {
    /// Raw `data`/`src` attribute value.
    pub reference: String,
    /// Normalized media type from the element's `type` attribute.
    pub media_type: String,
}

/// Finds the first `<object>`/`<embed>` element whose declared type is in
/// `media_types`.
///
/// Elements with a matching type but no usable reference are skipped.
#[must_use]
pub fn find_embedded_source(html: &[u8], media_types: &[String]) -> Option<EmbeddedSource> {
    let text = String::from_utf8_lossy(html);
    let document = Html::parse_document(&text);
    let wanted: Vec<String> = media_types
        .iter()
        .filter_map(|media_type| parse_media_type(media_type))
        .collect();

    let mut found = None;
    find_element(document.root_element(), &mut |element| {
        let attribute = match element.value().name() {
            "object" => "data",
            "embed" => "src",
            _ => return false,
        };
        let Some(media_type) = element.value().attr("type").and_then(parse_media_type) else {
            return false;
        };
        if !wanted.contains(&media_type) {
            return false;
        }
        let Some(reference) = element
            .value()
            .attr(attribute)
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
        else {
            return false;
        };
        found = Some(EmbeddedSource {
            reference: reference.to_string(),
            media_type,
        });
        true
    });
    found
}

fn find_element<'a>(
    element: ElementRef<'a>,
    predicate: &mut dyn FnMut(ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    if predicate(element) {
        return Some(element);
    }
    element
        .children()
        .filter_map(ElementRef::wrap)
        .find_map(|child| find_element(child, predicate))
}

/// Resolves an embedded reference against the page URL.
///
/// Relative references inherit the page's scheme and host; scheme-relative
/// ones (`//host/path`) default to HTTPS.
#[must_use]
pub(crate) fn resolve_reference(page_url: &Url, reference: &str) -> Option<Url> {
    if let Some(rest) = reference.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}")).ok();
    }
    match Url::parse(reference) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => page_url.join(reference).ok(),
        Err(_) => None,
    }
}

/// Handler following embedded documents in HTML pages.
#[derive(Debug, Clone)]
pub struct EmbeddedHandler {
    client: HttpClient,
    media_types: Vec<String>,
}

impl EmbeddedHandler {
    /// Creates a handler looking for the given embedded media types.
    #[must_use]
    pub fn new(client: HttpClient, media_types: Vec<String>) -> Self {
        Self {
            client,
            media_types,
        }
    }
}

#[async_trait]
impl DownloadHandler for EmbeddedHandler {
    fn name(&self) -> &'static str {
        HANDLER_NAME
    }

    #[tracing::instrument(skip(self, response), fields(handler = HANDLER_NAME, url = %response.url))]
    async fn handle(&self, response: &DownloadResponse) -> Result<HandleStep, HandleError> {
        if self.media_types.is_empty() || response.media_type() != HTML_MEDIA_TYPE {
            return Ok(HandleStep::NotHandled);
        }

        let Some(source) = find_embedded_source(&response.body, &self.media_types) else {
            return Ok(HandleStep::NotHandled);
        };
        let Some(embedded_url) = resolve_reference(&response.url, &source.reference) else {
            debug!(reference = %source.reference, "Embedded reference is not a usable URL");
            return Ok(HandleStep::NotHandled);
        };

        debug!(embedded_url = %embedded_url, media_type = %source.media_type, "Following embedded document");
        let fetched = self
            .client
            .get(&embedded_url)
            .await
            .map_err(|error| HandleError::transport(HANDLER_NAME, error))?;

        let file_name = infer_file_name(&fetched.url, &fetched.headers, &source.media_type);
        Ok(HandleStep::Handled(SourceContent {
            content: fetched.body,
            media_type: source.media_type,
            file_name,
        }))
    }
}
