//! Bibliography input parsing.
//!
//! # Example
//!
//! ```
//! use bibarchive_core::parser::parse_bibtex;
//!
//! let result = parse_bibtex("@article{smith2020, doi = {10.1234/abc}}");
//! assert_eq!(result.entries.len(), 1);
//! assert_eq!(result.entries[0].field("doi"), Some("10.1234/abc"));
//! ```

mod bibtex;
mod file_field;

pub use bibtex::{BibEntry, BibtexParseResult, parse_bibtex, render_bibtex};
pub use file_field::{LocalFileRef, parse_file_field};
