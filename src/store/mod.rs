//! Content-addressed storage of archived sources.
//!
//! A [`SourceStore`] receives one [`BibSource`] per archived record and
//! answers with where it put it. Identifiers are lowercase hex SHA-256
//! digests: a file's id is the digest of its bytes, a directory's id the
//! digest of its `name:id` listing, and the root id the digest of the
//! sorted listing of all directories. Equal inputs always give equal ids.
//!
//! - [`DirectoryStore`] - writes `<root>/<directory>/<file>` on disk
//! - [`NullStore`] - computes the same ids without writing (dry runs)
//! - [`SourcePathTemplate`] - picks directory and file names per record

mod directory;
mod error;
mod index;
mod null;
mod path;

pub use directory::DirectoryStore;
pub use error::StoreError;
pub use null::NullStore;
pub use path::{SourcePath, SourcePathTemplate};

use std::path::PathBuf;

use async_trait::async_trait;

/// Content to store for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibSource {
    /// Raw bytes.
    pub content: Vec<u8>,
    /// File name inside the record's directory.
    pub file_name: String,
    /// Directory name under the store root.
    pub directory_name: String,
}

/// Where a record's source ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntryLocation {
    /// Content identifier of the file.
    pub file_id: String,
    /// Stored file name.
    pub file_name: String,
    /// Identifier of the containing directory.
    pub directory_id: String,
    /// Stored directory name.
    pub directory_name: String,
    /// Path on disk, for stores that write files.
    pub path: Option<PathBuf>,
}

/// Storage seam for archived sources.
///
/// Writes are idempotent per citation key: adding a key again replaces its
/// previous source.
#[async_trait]
pub trait SourceStore: Send {
    /// Stores `source` under citation key `key`.
    async fn add_source(&mut self, key: &str, source: BibSource)
    -> Result<BibEntryLocation, StoreError>;

    /// Completes the store and returns its root identifier.
    async fn finalize(&mut self) -> Result<String, StoreError>;
}
