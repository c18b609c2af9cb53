//! Error types for response handlers.

use std::path::PathBuf;

use thiserror::Error;

use crate::network::NetworkError;

/// Failures raised while handling a response.
#[derive(Debug, Error)]
pub enum HandleError {
    /// A secondary request made by a handler failed.
    #[error("handler '{handler}' request failed: {source}")]
    Transport {
        /// Name of the failing handler.
        handler: &'static str,
        /// Underlying network failure.
        #[source]
        source: NetworkError,
    },

    /// The snapshot tool could not be started or fed.
    #[error(
        "failed to run snapshot tool {}: {source}\n  Suggestion: check `snapshot.path` or disable snapshots",
        program.display()
    )]
    SnapshotSpawn {
        /// Resolved path of the tool.
        program: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot tool exited unsuccessfully.
    #[error("snapshot tool {} failed ({status}): {stderr}", program.display())]
    SnapshotFailed {
        /// Resolved path of the tool.
        program: PathBuf,
        /// Exit status description.
        status: String,
        /// Trimmed standard error output.
        stderr: String,
    },
}

impl HandleError {
    /// Wraps a network failure raised while running `handler`.
    #[must_use]
    pub fn transport(handler: &'static str, source: NetworkError) -> Self {
        Self::Transport { handler, source }
    }

    /// Returns true if the failure must abort the whole run rather than
    /// count as a decline for the current record.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SnapshotSpawn { .. } | Self::SnapshotFailed { .. })
    }
}
