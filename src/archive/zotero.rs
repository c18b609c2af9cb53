//! Zotero group libraries as a record source.
//!
//! Items are listed with their BibLaTeX export; attachments are listed
//! separately and grouped under their parent item. Both listings page
//! through the API 50 items at a time until a short page.

use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::handler::{DownloadResponse, infer_file_name};
use crate::network::media::parse_media_type;
use crate::network::{HttpClient, NetworkError};
use crate::parser::{BibEntry, parse_bibtex};
use crate::resolver::ContentOrigin;

use super::DownloadedContent;

/// Production Zotero API root.
pub const ZOTERO_API_BASE: &str = "https://api.zotero.org";

const API_VERSION_HEADER: (&str, &str) = ("Zotero-API-Version", "3");
const PAGE_LIMIT: usize = 50;

/// How an attachment's content is stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// File uploaded to Zotero storage.
    ImportedFile,
    /// Page captured from a URL into Zotero storage.
    ImportedUrl,
    /// Link to a file on the user's disk.
    LinkedFile,
    /// Link to a web resource.
    LinkedUrl,
    /// Any mode this client does not know how to fetch.
    #[default]
    #[serde(other)]
    Other,
}

/// One attachment of a Zotero item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoteroAttachment {
    /// Attachment item key.
    pub key: String,
    /// Storage mode.
    pub link_mode: LinkMode,
    /// Source URL, for URL modes.
    pub url: Option<Url>,
    /// Declared media type.
    pub media_type: String,
    /// Stored file name, possibly empty.
    pub file_name: String,
}

/// A library item with its attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoteroCitation {
    /// Bibliographic entry parsed from the item's BibLaTeX export.
    pub entry: BibEntry,
    /// Attachments in listing order.
    pub attachments: Vec<ZoteroAttachment>,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    key: String,
    #[serde(default)]
    biblatex: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentResponse {
    key: String,
    data: AttachmentData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachmentData {
    #[serde(default)]
    parent_item: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    link_mode: LinkMode,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    filename: String,
}

/// Client for the Zotero web API.
#[derive(Debug, Clone)]
pub struct ZoteroClient {
    client: HttpClient,
    base_url: String,
}

impl ZoteroClient {
    /// Creates a client against the production API.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self::with_base_url(client, ZOTERO_API_BASE)
    }

    /// Creates a client against a custom API root.
    #[must_use]
    pub fn with_base_url(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Lists every item of a group together with its attachments.
    ///
    /// Items whose BibLaTeX export does not parse (attachments, notes) are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] if any listing page cannot be fetched or
    /// decoded.
    #[tracing::instrument(skip(self))]
    pub async fn download_citations(
        &self,
        group_id: &str,
    ) -> Result<Vec<ZoteroCitation>, NetworkError> {
        let items: Vec<ItemResponse> = self.list_all(group_id, "include=biblatex").await?;
        let attachments: Vec<AttachmentResponse> =
            self.list_all(group_id, "itemType=attachment").await?;

        let mut by_parent: HashMap<String, Vec<ZoteroAttachment>> = HashMap::new();
        for attachment in attachments {
            let Some(parent) = attachment.data.parent_item.clone() else {
                continue;
            };
            by_parent
                .entry(parent)
                .or_default()
                .push(attachment.into_attachment());
        }

        let mut citations = Vec::with_capacity(items.len());
        for item in items {
            let Some(entry) = parse_bibtex(&item.biblatex).entries.into_iter().next() else {
                debug!(item_key = %item.key, "Skipping item without a BibLaTeX entry");
                continue;
            };
            citations.push(ZoteroCitation {
                entry,
                attachments: by_parent.remove(&item.key).unwrap_or_default(),
            });
        }
        debug!(count = citations.len(), "Listed Zotero citations");
        Ok(citations)
    }

    /// Downloads an attachment's content.
    ///
    /// Returns `None` when the attachment has no fetchable location.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] if the download fails.
    #[tracing::instrument(skip(self, attachment), fields(attachment = %attachment.key))]
    pub async fn download_attachment(
        &self,
        group_id: &str,
        attachment: &ZoteroAttachment,
    ) -> Result<Option<DownloadedContent>, NetworkError> {
        let response = match attachment.link_mode {
            LinkMode::ImportedUrl | LinkMode::LinkedUrl => {
                let Some(url) = &attachment.url else {
                    return Ok(None);
                };
                self.client.get(url).await?
            }
            LinkMode::ImportedFile | LinkMode::LinkedFile => {
                let url = self.api_url(&format!(
                    "groups/{}/items/{}/file",
                    urlencoding::encode(group_id),
                    urlencoding::encode(&attachment.key)
                ))?;
                self.client
                    .get_with_headers(&url, &[API_VERSION_HEADER])
                    .await?
            }
            LinkMode::Other => return Ok(None),
        };

        let declared = parse_media_type(&attachment.media_type);
        let response = DownloadResponse::from_http(response, declared.clone());
        let media_type = declared.unwrap_or_else(|| response.media_type());
        let file_name = if attachment.file_name.trim().is_empty() {
            infer_file_name(&response.url, &response.headers, &media_type)
        } else {
            attachment.file_name.clone()
        };

        Ok(Some(DownloadedContent {
            content: response.body,
            media_type,
            file_name,
            origin: ContentOrigin::Zotero,
        }))
    }

    async fn list_all<T: DeserializeOwned>(
        &self,
        group_id: &str,
        query: &str,
    ) -> Result<Vec<T>, NetworkError> {
        let mut all = Vec::new();
        loop {
            let url = self.api_url(&format!(
                "groups/{}/items?{query}&start={}&limit={PAGE_LIMIT}",
                urlencoding::encode(group_id),
                all.len()
            ))?;
            let page: Vec<T> = self.client.get_json(&url, &[API_VERSION_HEADER]).await?;
            let page_len = page.len();
            all.extend(page);
            if page_len < PAGE_LIMIT {
                return Ok(all);
            }
        }
    }

    fn api_url(&self, path_and_query: &str) -> Result<Url, NetworkError> {
        let raw = format!("{}/{path_and_query}", self.base_url);
        Url::parse(&raw).map_err(|_| NetworkError::invalid_url(raw))
    }
}

impl AttachmentResponse {
    fn into_attachment(self) -> ZoteroAttachment {
        ZoteroAttachment {
            key: self.key,
            link_mode: self.data.link_mode,
            url: self
                .data
                .url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .and_then(|url| Url::parse(url.trim()).ok()),
            media_type: self.data.content_type,
            file_name: self.data.filename,
        }
    }
}
