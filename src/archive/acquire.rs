//! Per-record acquisition and the producer tasks that drive it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::handler::{DownloadResponse, HandleStep, HandlerChain};
use crate::locator::{CANONICAL_DOI_URL_PREFIX, SourceLocator, locate_entry_with_resolver};
use crate::network::HttpClient;
use crate::parser::BibEntry;
use crate::resolver::{ResolveStep, ResolverChain};

use super::local::{LocalPreference, read_local_source};
use super::zotero::{ZoteroCitation, ZoteroClient};
use super::{ArchiveError, BibContents, DownloadResult, DownloadedContent};

/// Runs the fixed attempt order for one record.
///
/// 1. a local attachment of a preferred media type,
/// 2. network acquisition through the resolver and handler chains,
/// 3. any other admissible local attachment,
/// 4. nothing: the record is reported as not archived.
///
/// Transport failures in step 2 only decline that step. Local read
/// failures and snapshot converter failures are fatal.
#[derive(Debug)]
pub struct Acquirer {
    config: Config,
    client: HttpClient,
    resolvers: ResolverChain,
    handlers: HandlerChain,
    doi_resolver: String,
}

impl Acquirer {
    /// Builds the HTTP client and the standard chains for a run.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Config`] if the client cannot be built or a
    /// proxy template is invalid.
    pub fn from_config(config: Config) -> Result<Self, ArchiveError> {
        let client = HttpClient::with_timeout(
            &config.archive.user_agent,
            Duration::from_secs(config.network.timeout_secs),
        )
        .map_err(|e| ArchiveError::config(e.to_string()))?;
        let resolvers = ResolverChain::from_config(&config, &client)
            .map_err(|e| ArchiveError::config(e.to_string()))?;
        let handlers = HandlerChain::from_config(&config, &client);
        info!(
            resolvers = ?resolvers.names(),
            handlers = handlers.len(),
            "Acquisition chains ready"
        );
        Ok(Self::new(config, client, resolvers, handlers))
    }

    /// Assembles an acquirer from prebuilt parts.
    #[must_use]
    pub fn new(
        config: Config,
        client: HttpClient,
        resolvers: ResolverChain,
        handlers: HandlerChain,
    ) -> Self {
        Self {
            config,
            client,
            resolvers,
            handlers,
            doi_resolver: CANONICAL_DOI_URL_PREFIX.to_string(),
        }
    }

    /// Builds DOI-only locators under `prefix` instead of `https://doi.org/`.
    #[must_use]
    pub fn with_doi_resolver(mut self, prefix: impl Into<String>) -> Self {
        self.doi_resolver = prefix.into();
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The shared HTTP client.
    #[must_use]
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Acquires the best available content for a BibTeX record.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] for fatal failures only; a record nothing
    /// could be found for is a successful result without content.
    #[tracing::instrument(skip(self, entry), fields(cite_key = %entry.key))]
    pub async fn acquire_entry(&self, entry: &BibEntry) -> DownloadResult {
        let locator = locate_entry_with_resolver(entry, &self.doi_resolver);
        let doi = locator.as_ref().and_then(|locator| locator.doi.clone());

        let mut contents =
            read_local_source(entry, &self.config, LocalPreference::Preferred).await?;
        if contents.is_none()
            && let Some(locator) = &locator
        {
            contents = self.download(locator).await?;
        }
        if contents.is_none() {
            contents = read_local_source(entry, &self.config, LocalPreference::Contingency).await?;
        }

        Ok(finish(entry.clone(), doi, contents))
    }

    /// Acquires the best available content for a Zotero item, using its
    /// attachments in place of local files.
    ///
    /// Attachment download failures decline the attachment.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] for fatal failures of network acquisition.
    #[tracing::instrument(skip(self, zotero, citation), fields(cite_key = %citation.entry.key))]
    pub async fn acquire_citation(
        &self,
        zotero: &ZoteroClient,
        group_id: &str,
        citation: &ZoteroCitation,
    ) -> DownloadResult {
        let locator = locate_entry_with_resolver(&citation.entry, &self.doi_resolver);
        let doi = locator.as_ref().and_then(|locator| locator.doi.clone());

        let mut contents = self
            .attachment_source(zotero, group_id, citation, LocalPreference::Preferred)
            .await;
        if contents.is_none()
            && let Some(locator) = &locator
        {
            contents = self.download(locator).await?;
        }
        if contents.is_none() {
            contents = self
                .attachment_source(zotero, group_id, citation, LocalPreference::Contingency)
                .await;
        }

        Ok(finish(citation.entry.clone(), doi, contents))
    }

    async fn attachment_source(
        &self,
        zotero: &ZoteroClient,
        group_id: &str,
        citation: &ZoteroCitation,
        preference: LocalPreference,
    ) -> Option<DownloadedContent> {
        let snapshots_allowed = self.config.zotero.include_snapshots;
        for attachment in citation
            .attachments
            .iter()
            .filter(|a| preference.admits(&self.config, &a.media_type, snapshots_allowed))
        {
            match zotero.download_attachment(group_id, attachment).await {
                Ok(Some(content)) => return Some(content),
                Ok(None) => {
                    debug!(attachment = %attachment.key, "Attachment has no fetchable location");
                }
                Err(error) => {
                    debug!(attachment = %attachment.key, error = %error, "Attachment download failed");
                }
            }
        }
        None
    }

    /// Network acquisition: redirect resolution, resolver chain, fetch,
    /// handler chain. Only a failing snapshot converter escapes as an error.
    async fn download(
        &self,
        locator: &SourceLocator,
    ) -> Result<Option<DownloadedContent>, ArchiveError> {
        let final_url = match self.client.resolve_redirect(&locator.url).await {
            Ok(url) => url,
            Err(error) => {
                debug!(url = %locator.url, error = %error, "Could not resolve redirects");
                return Ok(None);
            }
        };
        let locator = SourceLocator {
            url: final_url,
            doi: locator.doi.clone(),
        };

        let resolved = match self.resolvers.resolve(&locator).await {
            Ok(ResolveStep::Resolved(resolved)) => resolved,
            Ok(ResolveStep::NotResolved) => return Ok(None),
            Err(error) => {
                debug!(url = %locator.url, error = %error, "Resolution failed");
                return Ok(None);
            }
        };

        let response = match self.client.get(&resolved.resolved_url).await {
            Ok(response) => response,
            Err(error) => {
                debug!(url = %resolved.resolved_url, error = %error, "Fetch failed");
                return Ok(None);
            }
        };
        let response = DownloadResponse::from_http(response, resolved.media_type_hint.clone());

        match self.handlers.handle(&response).await {
            Ok(HandleStep::Handled(content)) => {
                Ok(Some(DownloadedContent::from_source(content, resolved.origin)))
            }
            Ok(HandleStep::NotHandled) => {
                debug!(url = %response.url, "No handler accepted the response");
                Ok(None)
            }
            Err(error) if error.is_fatal() => Err(ArchiveError::Snapshot(error)),
            Err(error) => {
                debug!(url = %response.url, error = %error, "Handling failed");
                Ok(None)
            }
        }
    }

    /// Spawns a task acquiring `entries` in order onto a bounded queue.
    ///
    /// The task stops after sending an error. Cancellation interrupts the
    /// current record and ends the queue with [`ArchiveError::Cancelled`].
    #[must_use]
    pub fn spawn_bibtex_producer(
        self: Arc<Self>,
        entries: Vec<BibEntry>,
        capacity: usize,
        cancel: CancelToken,
    ) -> (mpsc::Receiver<DownloadResult>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move {
            for entry in entries {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(ArchiveError::Cancelled),
                    result = self.acquire_entry(&entry) => result,
                };
                if !emit(&sender, result, &cancel).await {
                    break;
                }
            }
            debug!("BibTeX producer finished");
        });
        (receiver, handle)
    }

    /// Spawns a task listing a Zotero group and acquiring its items in
    /// order onto a bounded queue.
    ///
    /// A listing failure is sent as [`ArchiveError::Zotero`].
    #[must_use]
    pub fn spawn_zotero_producer(
        self: Arc<Self>,
        zotero: ZoteroClient,
        group_id: String,
        capacity: usize,
        cancel: CancelToken,
    ) -> (mpsc::Receiver<DownloadResult>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(async move {
            let listing = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ArchiveError::Cancelled),
                listing = zotero.download_citations(&group_id) => {
                    listing.map_err(|source| ArchiveError::Zotero {
                        group_id: group_id.clone(),
                        source,
                    })
                }
            };
            let citations = match listing {
                Ok(citations) => citations,
                Err(error) => {
                    emit(&sender, Err(error), &cancel).await;
                    return;
                }
            };

            for citation in &citations {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(ArchiveError::Cancelled),
                    result = self.acquire_citation(&zotero, &group_id, citation) => result,
                };
                if !emit(&sender, result, &cancel).await {
                    break;
                }
            }
            debug!("Zotero producer finished");
        });
        (receiver, handle)
    }
}

fn finish(
    entry: BibEntry,
    doi: Option<String>,
    contents: Option<DownloadedContent>,
) -> BibContents {
    match &contents {
        Some(found) => info!(
            cite_key = %entry.key,
            origin = %found.origin,
            media_type = %found.media_type,
            bytes = found.content.len(),
            "Acquired source"
        ),
        None => warn!(cite_key = %entry.key, "Could not find a source for citation"),
    }
    BibContents {
        entry,
        doi,
        contents,
    }
}

/// Sends one result downstream, waiting for queue space unless the run is
/// cancelled. Returns whether the producer should continue.
async fn emit(
    sender: &mpsc::Sender<DownloadResult>,
    result: DownloadResult,
    cancel: &CancelToken,
) -> bool {
    let terminal = result.is_err();
    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            // The consumer may be stalled; it also checks the token once the queue closes.
            let _ = sender.try_send(Err(ArchiveError::Cancelled));
            false
        }
        sent = sender.send(result) => sent.is_ok() && !terminal,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::archive::zotero::{LinkMode, ZoteroAttachment};
    use crate::resolver::ContentOrigin;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn acquirer(config: Config) -> Acquirer {
        Acquirer::from_config(config).unwrap()
    }

    fn pdf_response(body: &[u8]) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/pdf")
            .set_body_bytes(body.to_vec())
    }

    #[tokio::test]
    async fn test_preferred_local_file_skips_network() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(pdf_response(b"remote"))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("paper.pdf");
        std::fs::write(&local, b"local").unwrap();
        let entry = BibEntry::new("article", "k")
            .with_field("url", format!("{}/paper", server.uri()))
            .with_field("file", format!(":{}:application/pdf", local.display()));

        let result = acquirer(Config::default()).acquire_entry(&entry).await.unwrap();
        let contents = result.contents.unwrap();
        assert_eq!(contents.content, b"local");
        assert_eq!(contents.origin, ContentOrigin::LocalCache);
    }

    #[tokio::test]
    async fn test_network_is_tried_before_contingency_file() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/paper"))
            .respond_with(pdf_response(b"remote"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("page.html");
        std::fs::write(&snapshot, b"<html></html>").unwrap();
        let entry = BibEntry::new("article", "k")
            .with_field("url", format!("{}/paper", server.uri()))
            .with_field("file", format!(":{}:text/html", snapshot.display()));

        let mut config = Config::default();
        config.archive.include_local_snapshots = true;
        let result = acquirer(config).acquire_entry(&entry).await.unwrap();
        let contents = result.contents.unwrap();
        assert_eq!(contents.content, b"remote");
        assert_eq!(contents.media_type, "application/pdf");
        assert_eq!(contents.origin, ContentOrigin::ResolvedUrl);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_contingency_file() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("page.html");
        std::fs::write(&snapshot, b"<html></html>").unwrap();
        let entry = BibEntry::new("article", "k")
            .with_field("url", format!("{}/paper", server.uri()))
            .with_field("file", format!(":{}:text/html", snapshot.display()));

        let mut config = Config::default();
        config.archive.include_local_snapshots = true;
        let result = acquirer(config).acquire_entry(&entry).await.unwrap();
        let contents = result.contents.unwrap();
        assert_eq!(contents.origin, ContentOrigin::LocalCache);
        assert_eq!(contents.media_type, "text/html");
    }

    #[tokio::test]
    async fn test_record_without_sources_is_unarchived() {
        let entry = BibEntry::new("book", "nothing").with_field("title", "Offline");
        let result = acquirer(Config::default()).acquire_entry(&entry).await.unwrap();
        assert_eq!(result.entry.key, "nothing");
        assert_eq!(result.doi, None);
        assert_eq!(result.contents, None);
    }

    fn citation(attachments: Vec<ZoteroAttachment>) -> ZoteroCitation {
        ZoteroCitation {
            entry: BibEntry::new("article", "z").with_field("doi", "10.1234/z"),
            attachments,
        }
    }

    fn url_attachment(key: &str, url: String, media_type: &str) -> ZoteroAttachment {
        ZoteroAttachment {
            key: key.to_string(),
            link_mode: LinkMode::LinkedUrl,
            url: Some(url.parse().unwrap()),
            media_type: media_type.to_string(),
            file_name: format!("{key}.bin"),
        }
    }

    fn offline_acquirer(config: Config) -> Acquirer {
        Acquirer::new(
            config,
            HttpClient::new("bibarchive-test").unwrap(),
            ResolverChain::new(),
            HandlerChain::new(),
        )
    }

    #[tokio::test]
    async fn test_zotero_preferred_attachment_wins() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/snapshot"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pdf"))
            .respond_with(pdf_response(b"attached"))
            .mount(&server)
            .await;

        let zotero = ZoteroClient::with_base_url(
            HttpClient::new("bibarchive-test").unwrap(),
            server.uri(),
        );
        let citation = citation(vec![
            url_attachment("SNAP", format!("{}/snapshot", server.uri()), "text/html"),
            url_attachment("PDF", format!("{}/pdf", server.uri()), "application/pdf"),
        ]);

        let result = offline_acquirer(Config::default())
            .acquire_citation(&zotero, "1", &citation)
            .await
            .unwrap();
        assert_eq!(result.doi.as_deref(), Some("10.1234/z"));
        let contents = result.contents.unwrap();
        assert_eq!(contents.content, b"attached");
        assert_eq!(contents.origin, ContentOrigin::Zotero);
    }

    #[tokio::test]
    async fn test_zotero_snapshot_attachment_requires_opt_in() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/snapshot"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html></html>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let zotero = ZoteroClient::with_base_url(
            HttpClient::new("bibarchive-test").unwrap(),
            server.uri(),
        );
        let mut citation = citation(vec![
            url_attachment("GONE", format!("{}/gone", server.uri()), "application/pdf"),
            url_attachment("SNAP", format!("{}/snapshot", server.uri()), "text/html"),
        ]);
        // No locator, so the network step declines without leaving the mock.
        citation.entry = BibEntry::new("misc", "z");

        let without = offline_acquirer(Config::default())
            .acquire_citation(&zotero, "1", &citation)
            .await
            .unwrap();
        assert_eq!(without.contents, None);

        let mut config = Config::default();
        config.zotero.include_snapshots = true;
        let with = offline_acquirer(config)
            .acquire_citation(&zotero, "1", &citation)
            .await
            .unwrap();
        assert_eq!(with.contents.unwrap().media_type, "text/html");
    }

    #[tokio::test]
    async fn test_producer_emits_in_order() {
        let entries = vec![
            BibEntry::new("misc", "a"),
            BibEntry::new("misc", "b"),
            BibEntry::new("misc", "c"),
        ];
        let acquirer = Arc::new(acquirer(Config::default()));
        let (mut receiver, handle) =
            acquirer.spawn_bibtex_producer(entries, 1, CancelToken::new());

        let mut keys = Vec::new();
        while let Some(result) = receiver.recv().await {
            keys.push(result.unwrap().entry.key);
        }
        handle.await.unwrap();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_full_queue_blocks_producer_on_next_send() {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|key| {
                let file = dir.path().join(format!("{key}.pdf"));
                std::fs::write(&file, key.as_bytes()).unwrap();
                BibEntry::new("misc", *key)
                    .with_field("file", format!(":{}:application/pdf", file.display()))
            })
            .collect();
        let acquirer = Arc::new(acquirer(Config::default()));
        let (mut receiver, handle) =
            acquirer.spawn_bibtex_producer(entries, 1, CancelToken::new());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(receiver.len(), 1);
        assert!(!handle.is_finished());

        let mut keys = Vec::new();
        while let Some(result) = receiver.recv().await {
            keys.push(result.unwrap().entry.key);
        }
        handle.await.unwrap();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_cancelled_producer_ends_with_cancelled_error() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let acquirer = Arc::new(acquirer(Config::default()));
        let (mut receiver, handle) = acquirer.spawn_bibtex_producer(
            vec![BibEntry::new("misc", "a"), BibEntry::new("misc", "b")],
            4,
            cancel,
        );

        let first = receiver.recv().await.unwrap();
        assert!(first.unwrap_err().is_cancelled());
        assert!(receiver.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_fatal_local_error_stops_producer() {
        let dir = tempfile::tempdir().unwrap();
        let broken = BibEntry::new("misc", "broken")
            .with_field("file", format!(":{}:application/pdf", dir.path().display()));
        let acquirer = Arc::new(acquirer(Config::default()));
        let (mut receiver, handle) = acquirer.spawn_bibtex_producer(
            vec![BibEntry::new("misc", "ok"), broken, BibEntry::new("misc", "never")],
            4,
            CancelToken::new(),
        );

        assert_eq!(receiver.recv().await.unwrap().unwrap().entry.key, "ok");
        assert!(matches!(
            receiver.recv().await.unwrap(),
            Err(ArchiveError::Io { .. })
        ));
        assert!(receiver.recv().await.is_none());
        handle.await.unwrap();
    }
}
