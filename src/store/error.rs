//! Error types for source stores.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a [`super::SourceStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error while writing the store.
    #[error("IO error writing store at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A directory or file name would escape its parent.
    #[error("unsafe store name {name:?}\n  Suggestion: adjust the `naming` patterns")]
    UnsafeName {
        /// The offending name.
        name: String,
    },
}

impl StoreError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
