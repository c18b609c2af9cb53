//! Fatal run errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::handler::HandleError;
use crate::network::NetworkError;
use crate::store::StoreError;

/// Errors that abort an archive run.
///
/// Per-record declines and transport failures during network acquisition
/// never surface here; they end as unarchived records.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A local attachment exists but could not be read.
    #[error("IO error reading local source {path}: {source}")]
    Io {
        /// Attachment path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot converter could not be run.
    #[error("snapshot conversion failed: {0}")]
    Snapshot(#[source] HandleError),

    /// The run could not be set up from its configuration.
    #[error("invalid configuration: {message}\n  Suggestion: check the config file and flags")]
    Config {
        /// What is wrong.
        message: String,
    },

    /// The run was interrupted.
    #[error("archive run cancelled")]
    Cancelled,

    /// The Zotero library could not be listed.
    #[error("failed to list Zotero group {group_id}: {source}")]
    Zotero {
        /// Group whose listing failed.
        group_id: String,
        /// Underlying request failure.
        #[source]
        source: NetworkError,
    },

    /// Storing a source failed.
    #[error("failed to store source: {0}")]
    Store(#[from] StoreError),
}

impl ArchiveError {
    /// Creates a local I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true for [`ArchiveError::Cancelled`].
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
