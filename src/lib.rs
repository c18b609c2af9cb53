//! Bibarchive Core Library
//!
//! Finds, fetches and archives the full-text source of every record in a
//! bibliography. Each record goes through a fixed sequence of attempts
//! (local attachment, network acquisition, degraded local fallback) and
//! the results stream through deduplication into a content-addressed store.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - BibTeX reading and writing, local attachment fields
//! - [`locator`] - URL and DOI extraction from records
//! - [`network`] - HTTP transport shared by every network step
//! - [`resolver`] - Locator to fetch URL strategies (Unpaywall, proxies, direct)
//! - [`handler`] - Response to content strategies (embedded, snapshot, direct)
//! - [`archive`] - Per-record acquisition, deduplication and the run pipeline
//! - [`store`] - Content-addressed storage and naming
//! - [`config`] - TOML configuration with defaults and validation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod cancel;
pub mod config;
pub mod handler;
pub mod locator;
pub mod network;
pub mod parser;
pub mod pattern;
pub mod resolver;
pub mod store;
pub mod user_agent;

#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use archive::{
    Acquirer, ArchiveError, ArchivePipeline, ArchiveReport, BibContents, DownloadResult,
    DownloadedContent, Output, ZoteroClient, rewrite_entry_urls,
};
pub use cancel::CancelToken;
pub use config::{Config, LoadedConfig, load_config, parse_config_str};
pub use handler::{HandlerChain, SourceContent};
pub use locator::{SourceLocator, locate_entry};
pub use network::{HttpClient, NetworkError};
pub use parser::{BibEntry, parse_bibtex, render_bibtex};
pub use resolver::{ContentOrigin, ResolvedLocator, ResolverChain};
pub use store::{DirectoryStore, NullStore, SourcePathTemplate, SourceStore};
