//! Wiring of the producer, deduplication and store stages.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::parser::BibEntry;
use crate::resolver::ContentOrigin;
use crate::store::{BibEntryLocation, BibSource, SourcePathTemplate, SourceStore};

use super::dedup::Deduplicator;
use super::zotero::ZoteroClient;
use super::{Acquirer, ArchiveError, BibContents, DownloadResult};

/// Final state of one citation after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// The record, as read from the collection.
    pub entry: BibEntry,
    /// DOI found for the record.
    pub doi: Option<String>,
    /// Media type of the stored source.
    pub media_type: Option<String>,
    /// Strategy that produced the stored source.
    pub origin: Option<ContentOrigin>,
    /// Where the source was stored; `None` when nothing was archived.
    pub location: Option<BibEntryLocation>,
}

impl ReportEntry {
    /// Returns true if a source was stored for the citation.
    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.location.is_some()
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Root identifier returned by the store.
    pub root_id: String,
    /// One entry per citation key, in first-seen order.
    pub entries: Vec<ReportEntry>,
}

impl ArchiveReport {
    /// Number of citations with a stored source.
    #[must_use]
    pub fn archived_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_archived()).count()
    }
}

/// Receiving end of a running pipeline.
#[derive(Debug)]
pub struct PipelineStream {
    receiver: mpsc::Receiver<DownloadResult>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineStream {
    /// Receives the next deduplicated result.
    pub async fn recv(&mut self) -> Option<DownloadResult> {
        self.receiver.recv().await
    }

    fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }

    async fn join(self) {
        drop(self.receiver);
        for task in self.tasks {
            if let Err(error) = task.await
                && !error.is_cancelled()
            {
                debug!(error = %error, "Pipeline task ended abnormally");
            }
        }
    }
}

/// A run over one collection, bounded by one cancellation token.
#[derive(Debug, Clone)]
pub struct ArchivePipeline {
    acquirer: Arc<Acquirer>,
    cancel: CancelToken,
}

impl ArchivePipeline {
    /// Creates a pipeline around `acquirer`.
    #[must_use]
    pub fn new(acquirer: Acquirer, cancel: CancelToken) -> Self {
        Self {
            acquirer: Arc::new(acquirer),
            cancel,
        }
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn capacity(&self) -> usize {
        self.acquirer.config().pipeline.queue_capacity
    }

    fn deduplicate(
        &self,
        receiver: mpsc::Receiver<DownloadResult>,
        producer: JoinHandle<()>,
    ) -> PipelineStream {
        let preferred = self.acquirer.config().archive.preferred_media_types.clone();
        let dedup = Deduplicator::new(preferred);
        let (receiver, dedup_task) = dedup.spawn(receiver, self.capacity());
        PipelineStream {
            receiver,
            tasks: vec![producer, dedup_task],
        }
    }

    /// Starts acquiring a BibTeX collection.
    #[must_use]
    pub fn spawn_bibtex_pipeline(&self, entries: Vec<BibEntry>) -> PipelineStream {
        info!(entries = entries.len(), "Starting BibTeX pipeline");
        let (receiver, producer) = Arc::clone(&self.acquirer).spawn_bibtex_producer(
            entries,
            self.capacity(),
            self.cancel.clone(),
        );
        self.deduplicate(receiver, producer)
    }

    /// Starts acquiring a Zotero group library.
    #[must_use]
    pub fn spawn_zotero_pipeline(
        &self,
        zotero: ZoteroClient,
        group_id: impl Into<String>,
    ) -> PipelineStream {
        let group_id = group_id.into();
        info!(group_id = %group_id, "Starting Zotero pipeline");
        let (receiver, producer) = Arc::clone(&self.acquirer).spawn_zotero_producer(
            zotero,
            group_id,
            self.capacity(),
            self.cancel.clone(),
        );
        self.deduplicate(receiver, producer)
    }

    /// Drains `stream` into `store`, naming each source with `naming`.
    ///
    /// `observer` sees every forwarded candidate before it is stored.
    ///
    /// # Errors
    ///
    /// Returns the first error from any stage, or
    /// [`ArchiveError::Cancelled`] if the run was cancelled.
    pub async fn store_results<F>(
        &self,
        mut stream: PipelineStream,
        store: &mut dyn SourceStore,
        naming: &mut SourcePathTemplate,
        mut observer: F,
    ) -> Result<ArchiveReport, ArchiveError>
    where
        F: FnMut(&BibContents),
    {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut entries: Vec<ReportEntry> = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                next = stream.recv() => next,
            };
            let Some(result) = next else {
                break;
            };
            let candidate = match result {
                Ok(candidate) => candidate,
                Err(error) => {
                    stream.join().await;
                    return Err(error);
                }
            };
            observer(&candidate);

            let report = match store_candidate(store, naming, candidate).await {
                Ok(report) => report,
                Err(error) => {
                    stream.abort();
                    stream.join().await;
                    return Err(error);
                }
            };
            match positions.get(&report.entry.key) {
                Some(&position) => entries[position] = report,
                None => {
                    positions.insert(report.entry.key.clone(), entries.len());
                    entries.push(report);
                }
            }
        }

        if self.cancel.is_cancelled() {
            stream.abort();
            stream.join().await;
            return Err(ArchiveError::Cancelled);
        }
        stream.join().await;

        let root_id = store.finalize().await?;
        let report = ArchiveReport { root_id, entries };
        info!(
            entries = report.entries.len(),
            archived = report.archived_count(),
            root_id = %report.root_id,
            "Archive run complete"
        );
        Ok(report)
    }
}

async fn store_candidate(
    store: &mut dyn SourceStore,
    naming: &mut SourcePathTemplate,
    candidate: BibContents,
) -> Result<ReportEntry, ArchiveError> {
    let BibContents {
        entry,
        doi,
        contents,
    } = candidate;
    let Some(contents) = contents else {
        return Ok(ReportEntry {
            entry,
            doi,
            media_type: None,
            origin: None,
            location: None,
        });
    };

    let path = naming.execute(&entry, doi.as_deref(), &contents.file_name, &contents.media_type);
    let location = store
        .add_source(
            &entry.key,
            BibSource {
                content: contents.content,
                file_name: path.file_name,
                directory_name: path.directory_name,
            },
        )
        .await?;
    Ok(ReportEntry {
        entry,
        doi,
        media_type: Some(contents.media_type),
        origin: Some(contents.origin),
        location: Some(location),
    })
}
