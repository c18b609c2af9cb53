//! The acquisition pipeline.
//!
//! Records flow through three stages connected by bounded queues:
//!
//! 1. a producer task running the per-record [`Acquirer`] (local cache,
//!    network acquisition, local contingency),
//! 2. the streaming [`Deduplicator`], forwarding only improving candidates
//!    per citation key,
//! 3. the store stage driven by the caller through
//!    [`ArchivePipeline::store_results`].
//!
//! A fatal error travels down the queues as the last item and stops every
//! stage. Cancelling the run's [`CancelToken`](crate::CancelToken) drops
//! in-flight requests and kills a running snapshot converter.

mod acquire;
mod dedup;
mod error;
mod local;
mod output;
mod pipeline;
mod zotero;

pub use acquire::Acquirer;
pub use dedup::{ContentRank, Deduplicator};
pub use error::ArchiveError;
pub use output::{ArchivedOutput, NotArchivedOutput, Output, rewrite_entry_urls};
pub use pipeline::{ArchivePipeline, ArchiveReport, PipelineStream, ReportEntry};
pub use zotero::{LinkMode, ZOTERO_API_BASE, ZoteroAttachment, ZoteroCitation, ZoteroClient};

use crate::handler::SourceContent;
use crate::parser::BibEntry;
use crate::resolver::ContentOrigin;

/// Content acquired for a record, with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedContent {
    /// Raw bytes.
    pub content: Vec<u8>,
    /// Media type of `content`.
    pub media_type: String,
    /// File name the content arrived with.
    pub file_name: String,
    /// Strategy that produced the content.
    pub origin: ContentOrigin,
}

impl DownloadedContent {
    /// Tags handled content with the origin of the resolver that found it.
    #[must_use]
    pub fn from_source(source: SourceContent, origin: ContentOrigin) -> Self {
        Self {
            content: source.content,
            media_type: source.media_type,
            file_name: source.file_name,
            origin,
        }
    }
}

/// Outcome of acquisition for one record.
///
/// `contents` is `None` when no strategy produced anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibContents {
    /// The bibliographic record.
    pub entry: BibEntry,
    /// DOI found for the record, if any.
    pub doi: Option<String>,
    /// Acquired content.
    pub contents: Option<DownloadedContent>,
}

/// Unit flowing through the pipeline queues. An error is always the last
/// item a stage emits.
pub type DownloadResult = Result<BibContents, ArchiveError>;
