//! Reading the BibTeX collection from a file or stdin.

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use bibarchive_core::{BibEntry, parse_bibtex};
use tracing::{info, warn};

/// Source argument that selects standard input.
pub(crate) const STDIN_SOURCE: &str = "-";

/// Reads and parses the collection named by `source`.
pub(crate) fn read_bibtex_source(source: &str) -> Result<Vec<BibEntry>> {
    let text = if source == STDIN_SOURCE {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read BibTeX from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("Failed to read BibTeX file '{source}'"))?
    };
    Ok(parse_collection(&text))
}

/// Parses collection text, logging every skipped block.
pub(crate) fn parse_collection(text: &str) -> Vec<BibEntry> {
    let result = parse_bibtex(text);
    for skipped in &result.skipped {
        warn!(reason = %skipped, "Skipped malformed BibTeX entry");
    }
    info!(
        entries = result.entries.len(),
        skipped = result.skipped.len(),
        "Parsed bibliography"
    );
    result.entries
}
