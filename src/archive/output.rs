//! Run summaries and the rewritten collection.

use std::io::Write;

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::parser::BibEntry;
use crate::resolver::ContentOrigin;

use super::{ArchiveError, ArchiveReport};

/// Machine-readable summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    /// Root identifier of the store.
    pub cid: String,
    pub total_entries: usize,
    pub total_archived: usize,
    pub archived: Vec<ArchivedOutput>,
    pub not_archived: Vec<NotArchivedOutput>,
}

/// A citation whose source was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedOutput {
    pub cite_name: String,
    pub doi: Option<String>,
    pub media_type: String,
    pub file_cid: String,
    pub file_name: String,
    pub directory_cid: String,
    pub directory_name: String,
    pub content_origin: ContentOrigin,
}

/// A citation nothing could be stored for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotArchivedOutput {
    pub cite_name: String,
    pub doi: Option<String>,
}

impl Output {
    /// Summarizes a completed run.
    #[must_use]
    pub fn from_report(report: &ArchiveReport) -> Self {
        let mut archived = Vec::new();
        let mut not_archived = Vec::new();
        for entry in &report.entries {
            match (&entry.location, &entry.media_type, entry.origin) {
                (Some(location), Some(media_type), Some(origin)) => {
                    archived.push(ArchivedOutput {
                        cite_name: entry.entry.key.clone(),
                        doi: entry.doi.clone(),
                        media_type: media_type.clone(),
                        file_cid: location.file_id.clone(),
                        file_name: location.file_name.clone(),
                        directory_cid: location.directory_id.clone(),
                        directory_name: location.directory_name.clone(),
                        content_origin: origin,
                    });
                }
                _ => not_archived.push(NotArchivedOutput {
                    cite_name: entry.entry.key.clone(),
                    doi: entry.doi.clone(),
                }),
            }
        }
        Self {
            cid: report.root_id.clone(),
            total_entries: report.entries.len(),
            total_archived: archived.len(),
            archived,
            not_archived,
        }
    }

    /// Writes the human-readable summary.
    ///
    /// # Errors
    ///
    /// Returns any error from `out`.
    pub fn pretty_print(&self, out: &mut impl Write) -> std::io::Result<()> {
        writeln!(out, "Root CID: {}", self.cid)?;
        writeln!(out, "Total entries: {}", self.total_entries)?;
        writeln!(out, "Entries archived: {}", self.total_archived)?;
        writeln!(out, "Entries not archived: {}", self.not_archived.len())?;
        for missing in &self.not_archived {
            match &missing.doi {
                Some(doi) => writeln!(out, "  - {} (doi: {doi})", missing.cite_name)?,
                None => writeln!(out, "  - {}", missing.cite_name)?,
            }
        }
        Ok(())
    }

    /// Pretty JSON rendering.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Returns the report's records with `url` pointing at the stored file.
///
/// Records without a stored file on disk are returned unchanged.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] if a stored path cannot be made absolute.
pub fn rewrite_entry_urls(report: &ArchiveReport) -> Result<Vec<BibEntry>, ArchiveError> {
    let mut entries = Vec::with_capacity(report.entries.len());
    for report_entry in &report.entries {
        let mut entry = report_entry.entry.clone();
        if let Some(path) = report_entry
            .location
            .as_ref()
            .and_then(|location| location.path.as_ref())
        {
            let absolute = std::path::absolute(path).map_err(|e| ArchiveError::io(path, e))?;
            match Url::from_file_path(&absolute) {
                Ok(url) => entry.set_field("url", url.as_str()),
                Err(()) => {
                    debug!(path = %absolute.display(), "Stored path has no file URL");
                }
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}
