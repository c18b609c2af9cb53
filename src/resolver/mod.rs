//! Turning a record's locator into a fetchable URL.
//!
//! Resolution is an ordered chain of strategies. Each strategy either
//! produces a [`ResolvedLocator`] or declines; the first one that produces
//! a result wins. A decline is a normal outcome and never an error.
//!
//! # Architecture
//!
//! - [`SourceResolver`] - Async trait that individual strategies implement
//! - [`ResolverChain`] - Ordered collection with the first-wins loop
//! - [`ResolveStep`] - Outcome of a single strategy
//! - [`UnpaywallResolver`] - Open-access lookup by DOI
//! - [`UserResolver`] - Configured proxy URL templates, probed for existence
//! - [`DirectResolver`] - The record's own (redirect-resolved) URL
//!
//! # Example
//!
//! ```no_run
//! use bibarchive_core::config::Config;
//! use bibarchive_core::locator::doi_url;
//! use bibarchive_core::network::HttpClient;
//! use bibarchive_core::resolver::{ResolveStep, ResolverChain};
//! use bibarchive_core::SourceLocator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let client = HttpClient::new("bibarchive-example")?;
//! let chain = ResolverChain::from_config(&config, &client)?;
//!
//! let locator = SourceLocator {
//!     url: doi_url("10.1234/abc").ok_or("bad DOI")?,
//!     doi: Some("10.1234/abc".to_string()),
//! };
//! if let ResolveStep::Resolved(resolved) = chain.resolve(&locator).await? {
//!     println!("{} via {}", resolved.resolved_url, resolved.origin);
//! }
//! # Ok(())
//! # }
//! ```

mod chain;
mod direct;
mod error;
mod unpaywall;
mod user;

pub use chain::ResolverChain;
pub use direct::DirectResolver;
pub use error::ResolveError;
pub use unpaywall::{UNPAYWALL_API_BASE, UnpaywallResolver};
pub use user::{HostnameFilter, ResolverRule, UserResolver};

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::locator::SourceLocator;

/// Which acquisition strategy produced a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContentOrigin {
    /// A file already on disk, referenced by the record.
    #[serde(rename = "local")]
    LocalCache,
    /// The record's own URL after following redirects.
    #[serde(rename = "url")]
    ResolvedUrl,
    /// An open-access copy located through Unpaywall.
    #[serde(rename = "unpaywall")]
    OpenAccess,
    /// A user-configured proxy template.
    #[serde(rename = "user-resolver")]
    UserResolver,
    /// An attachment stored in a Zotero library.
    #[serde(rename = "zotero")]
    Zotero,
}

impl ContentOrigin {
    /// Short tag used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalCache => "local",
            Self::ResolvedUrl => "url",
            Self::OpenAccess => "unpaywall",
            Self::UserResolver => "user-resolver",
            Self::Zotero => "zotero",
        }
    }
}

impl fmt::Display for ContentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locator that a strategy turned into something fetchable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocator {
    /// The locator URL the chain was asked about.
    pub original_url: Url,
    /// Where to fetch the content from.
    pub resolved_url: Url,
    /// Strategy that produced this result.
    pub origin: ContentOrigin,
    /// Media type the strategy expects the content to have, used when the
    /// server does not say.
    pub media_type_hint: Option<String>,
}

/// Outcome of a single resolution strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveStep {
    /// The strategy located the content.
    Resolved(ResolvedLocator),
    /// The strategy does not apply to this locator.
    NotResolved,
}

/// A strategy for turning a locator into a fetchable URL.
///
/// Implementations receive the redirect-resolved locator. Declining is
/// expressed as [`ResolveStep::NotResolved`]; errors are reserved for
/// failures such as an unreachable lookup service.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Attempts to resolve `locator`.
    async fn resolve(&self, locator: &SourceLocator) -> Result<ResolveStep, ResolveError>;
}
