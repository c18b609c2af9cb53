//! Identifier bookkeeping shared by every store.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use sha2::{Digest, Sha256};

use super::{BibEntryLocation, BibSource, StoreError};

/// Per-key locations and the digests derived from them.
#[derive(Debug, Default)]
pub(crate) struct StoreIndex {
    entries: BTreeMap<String, BibEntryLocation>,
}

impl StoreIndex {
    /// Computes the location of `source` without recording it.
    pub(crate) fn locate(source: &BibSource) -> Result<BibEntryLocation, StoreError> {
        ensure_safe_name(&source.directory_name)?;
        ensure_safe_name(&source.file_name)?;

        let file_id = digest_hex(&source.content);
        let directory_id = digest_hex(format!("{}:{file_id}\n", source.file_name).as_bytes());
        Ok(BibEntryLocation {
            file_id,
            file_name: source.file_name.clone(),
            directory_id,
            directory_name: source.directory_name.clone(),
            path: None,
        })
    }

    /// Records `location` for `key`, returning what it replaced.
    pub(crate) fn insert(
        &mut self,
        key: &str,
        location: BibEntryLocation,
    ) -> Option<BibEntryLocation> {
        self.entries.insert(key.to_string(), location)
    }

    /// Digest over the sorted `directory:id` listing of every entry.
    pub(crate) fn root_id(&self) -> String {
        let mut listing: Vec<String> = self
            .entries
            .values()
            .map(|location| format!("{}:{}\n", location.directory_name, location.directory_id))
            .collect();
        listing.sort();
        digest_hex(listing.concat().as_bytes())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn ensure_safe_name(name: &str) -> Result<(), StoreError> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if name.is_empty() || !single_normal || name.contains(['/', '\\']) {
        return Err(StoreError::UnsafeName {
            name: name.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn digest_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
