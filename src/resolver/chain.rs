//! Ordered resolver chain with first-wins resolution.

use std::fmt;

use tracing::{debug, info};

use crate::config::Config;
use crate::locator::SourceLocator;
use crate::network::HttpClient;
use crate::pattern::PatternError;

use super::{
    DirectResolver, ResolveError, ResolveStep, SourceResolver, UnpaywallResolver, UserResolver,
};

/// Resolvers tried in registration order.
///
/// The first resolver returning [`ResolveStep::Resolved`] wins. An error
/// from any resolver stops the chain and is returned to the caller.
pub struct ResolverChain {
    resolvers: Vec<Box<dyn SourceResolver>>,
}

impl ResolverChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Builds the standard chain for a run: open-access lookup (when an
    /// email is configured), user proxy rules (when any exist), then the
    /// direct URL.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if a proxy template is invalid.
    pub fn from_config(config: &Config, client: &HttpClient) -> Result<Self, PatternError> {
        let mut chain = Self::new();
        if config.unpaywall.is_active() {
            chain.register(Box::new(UnpaywallResolver::new(
                client.clone(),
                config.unpaywall.email.clone(),
            )));
        }
        if !config.resolvers.is_empty() {
            chain.register(Box::new(UserResolver::new(client.clone(), &config.resolvers)?));
        }
        chain.register(Box::new(DirectResolver::new()));
        Ok(chain)
    }

    /// Appends a resolver to the end of the chain.
    #[tracing::instrument(skip(self, resolver), fields(resolver_name))]
    pub fn register(&mut self, resolver: Box<dyn SourceResolver>) {
        let name = resolver.name();
        tracing::Span::current().record("resolver_name", name);
        debug!(resolver = name, position = self.resolvers.len(), "Registering resolver");
        self.resolvers.push(resolver);
    }

    /// Number of registered resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Names of registered resolvers, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Runs the chain for `locator`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResolveError`] raised by a resolver.
    #[tracing::instrument(skip(self, locator), fields(url = %locator.url))]
    pub async fn resolve(&self, locator: &SourceLocator) -> Result<ResolveStep, ResolveError> {
        for resolver in &self.resolvers {
            debug!(resolver = resolver.name(), "Trying resolver");
            match resolver.resolve(locator).await? {
                ResolveStep::Resolved(resolved) => {
                    info!(
                        resolver = resolver.name(),
                        resolved_url = %resolved.resolved_url,
                        "Locator resolved"
                    );
                    return Ok(ResolveStep::Resolved(resolved));
                }
                ResolveStep::NotResolved => {
                    debug!(resolver = resolver.name(), "Resolver declined");
                }
            }
        }
        Ok(ResolveStep::NotResolved)
    }
}

impl Default for ResolverChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverChain")
            .field("resolvers", &self.names())
            .finish()
    }
}
