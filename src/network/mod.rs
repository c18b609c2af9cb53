//! HTTP transport shared by resolvers, handlers and the Zotero client.

mod client;
mod error;
pub mod media;

pub use client::{DEFAULT_TIMEOUT_SECS, HttpClient, HttpResponse};
pub use error::NetworkError;
