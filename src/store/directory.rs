//! Store writing sources into a local directory tree.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::index::StoreIndex;
use super::{BibEntryLocation, BibSource, SourceStore, StoreError};

/// Writes each source to `<root>/<directory>/<file>`.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    index: StoreIndex,
}

impl DirectoryStore {
    /// Creates a store rooted at `root`. The directory is created on the
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: StoreIndex::default(),
        }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl SourceStore for DirectoryStore {
    #[tracing::instrument(skip(self, source), fields(directory = %source.directory_name, file = %source.file_name))]
    async fn add_source(
        &mut self,
        key: &str,
        source: BibSource,
    ) -> Result<BibEntryLocation, StoreError> {
        let mut location = StoreIndex::locate(&source)?;
        let directory = self.root.join(&location.directory_name);
        let path = directory.join(&location.file_name);

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| StoreError::io(&directory, e))?;
        tokio::fs::write(&path, &source.content)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        location.path = Some(path.clone());
        if let Some(previous) = self.index.insert(key, location.clone())
            && let Some(previous_path) = previous.path
            && previous_path != path
        {
            debug!(previous = %previous_path.display(), "Replacing earlier source for key");
            match tokio::fs::remove_file(&previous_path).await {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(StoreError::io(previous_path, error)),
            }
        }

        debug!(path = %path.display(), file_id = %location.file_id, "Stored source");
        Ok(location)
    }

    async fn finalize(&mut self) -> Result<String, StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;
        let root_id = self.index.root_id();
        info!(root = %self.root.display(), entries = self.index.len(), root_id = %root_id, "Store finalized");
        Ok(root_id)
    }
}
