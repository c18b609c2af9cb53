//! Error types for resolution strategies.

use thiserror::Error;

use crate::network::NetworkError;

/// Failures raised by a resolution strategy.
///
/// A strategy that simply does not apply returns
/// [`super::ResolveStep::NotResolved`] instead.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A request made on behalf of the strategy failed.
    #[error("resolver '{resolver}' request failed: {source}")]
    Transport {
        /// Name of the failing strategy.
        resolver: &'static str,
        /// Underlying network failure.
        #[source]
        source: NetworkError,
    },
}

impl ResolveError {
    /// Wraps a network failure raised while running `resolver`.
    #[must_use]
    pub fn transport(resolver: &'static str, source: NetworkError) -> Self {
        Self::Transport { resolver, source }
    }

    /// Name of the strategy that failed.
    #[must_use]
    pub fn resolver(&self) -> &'static str {
        match self {
            Self::Transport { resolver, .. } => resolver,
        }
    }
}
