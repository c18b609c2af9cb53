//! Store that computes identifiers without writing anything.

use async_trait::async_trait;

use super::index::StoreIndex;
use super::{BibEntryLocation, BibSource, SourceStore, StoreError};

/// Dry-run store.
#[derive(Debug, Default)]
pub struct NullStore {
    index: StoreIndex,
}

impl NullStore {
    /// Creates an empty dry-run store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SourceStore for NullStore {
    async fn add_source(
        &mut self,
        key: &str,
        source: BibSource,
    ) -> Result<BibEntryLocation, StoreError> {
        let location = StoreIndex::locate(&source)?;
        self.index.insert(key, location.clone());
        Ok(location)
    }

    async fn finalize(&mut self) -> Result<String, StoreError> {
        tracing::debug!(entries = self.index.len(), "Dry run: nothing written");
        Ok(self.index.root_id())
    }
}
