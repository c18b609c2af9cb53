//! Parsing of the reference-manager `file` field.
//!
//! Zotero and JabRef exports list attachments as
//! `description:path:media-type` triples joined by `;`.

use std::path::PathBuf;

const FILE_SEPARATOR: char = ';';
const FILE_FIELD_SEPARATOR: char = ':';
const FILE_FIELD_COUNT: usize = 3;

/// A locally stored attachment referenced by an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileRef {
    /// Free-text label, e.g. `Full Text PDF`.
    pub description: String,
    /// Path on disk.
    pub path: PathBuf,
    /// Declared media type.
    pub media_type: String,
}

/// Splits a `file` field into attachment references, dropping triples with
/// the wrong arity.
#[must_use]
pub fn parse_file_field(raw: &str) -> Vec<LocalFileRef> {
    raw.split(FILE_SEPARATOR)
        .filter_map(|entry| {
            let parts: Vec<&str> = entry.split(FILE_FIELD_SEPARATOR).collect();
            if parts.len() != FILE_FIELD_COUNT {
                return None;
            }
            Some(LocalFileRef {
                description: parts[0].trim().to_string(),
                path: PathBuf::from(parts[1].trim()),
                media_type: parts[2].trim().to_ascii_lowercase(),
            })
        })
        .collect()
}
