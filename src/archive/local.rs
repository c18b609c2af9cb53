//! Reading attachments already stored on disk.

use std::io::ErrorKind;

use tracing::debug;

use crate::config::Config;
use crate::network::media::{HTML_MEDIA_TYPE, parse_media_type};
use crate::parser::{BibEntry, LocalFileRef, parse_file_field};
use crate::resolver::ContentOrigin;

use super::{ArchiveError, DownloadedContent};

const FALLBACK_FILE_NAME: &str = "source";

/// Which local attachments an attempt may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalPreference {
    /// Only attachments of a preferred media type.
    Preferred,
    /// Only attachments of other types; HTML only when local snapshots are
    /// allowed.
    Contingency,
}

impl LocalPreference {
    pub(crate) fn admits(self, config: &Config, media_type: &str, snapshots_allowed: bool) -> bool {
        let preferred = config.is_preferred_media_type(media_type);
        match self {
            Self::Preferred => preferred,
            Self::Contingency => {
                !preferred
                    && (snapshots_allowed
                        || parse_media_type(media_type).as_deref() != Some(HTML_MEDIA_TYPE))
            }
        }
    }
}

/// Reads the first admissible attachment listed in the entry's `file`
/// field.
///
/// A listed file that does not exist is skipped.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] when an existing file cannot be read.
pub(crate) async fn read_local_source(
    entry: &BibEntry,
    config: &Config,
    preference: LocalPreference,
) -> Result<Option<DownloadedContent>, ArchiveError> {
    let Some(field) = entry.field("file") else {
        return Ok(None);
    };

    let snapshots_allowed = config.archive.include_local_snapshots;
    for file in parse_file_field(field)
        .into_iter()
        .filter(|file| preference.admits(config, &file.media_type, snapshots_allowed))
    {
        match tokio::fs::read(&file.path).await {
            Ok(content) => {
                debug!(cite_key = %entry.key, path = %file.path.display(), "Using local source");
                return Ok(Some(local_content(&file, content)));
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(cite_key = %entry.key, path = %file.path.display(), "Local source missing");
            }
            Err(error) => return Err(ArchiveError::io(&file.path, error)),
        }
    }
    Ok(None)
}

fn local_content(file: &LocalFileRef, content: Vec<u8>) -> DownloadedContent {
    let file_name = file
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
    DownloadedContent {
        content,
        media_type: parse_media_type(&file.media_type).unwrap_or_else(|| file.media_type.clone()),
        file_name,
        origin: ContentOrigin::LocalCache,
    }
}
